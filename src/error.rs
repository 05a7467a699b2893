// src/error.rs

//! Error types for the copy and resolution core

use thiserror::Error;

/// Errors surfaced to callers of the library
///
/// Resolution itself never fails: problems found while walking the
/// dependency graph are reported through [`crate::resolver::Diagnostics`].
/// These variants cover malformed input at the boundaries and failures of
/// the storage collaborator.
#[derive(Error, Debug)]
pub enum Error {
    /// A version string could not be split into epoch/version/release
    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    /// A dependency expression could not be parsed
    #[error("Syntax error in dependency expression '{expression}' at offset {offset}: {reason}")]
    ExpressionSyntax {
        expression: String,
        offset: usize,
        reason: String,
    },

    /// The copy request does not describe a usable copy
    #[error("Invalid copy request: {0}")]
    InvalidRequest(String),

    /// A repository, version or content unit does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Configuration file is unusable
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Strict mode refused to commit a copy with missing hard requirements
    #[error("{count} unresolved dependencies while copying into '{repository}'")]
    UnresolvedDependencies { repository: String, count: usize },

    /// Only one copy may commit to a destination at a time
    #[error("Repository '{0}' is being written by another copy")]
    DestinationBusy(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
