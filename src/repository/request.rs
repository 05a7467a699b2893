// src/repository/request.rs

//! Copy requests
//!
//! A request is a list of mappings, each copying from one source snapshot
//! into one destination repository, plus the `dependency_solving` switch.
//! Requests are checked here, before anything is resolved.

use crate::error::{Error, Result};
use crate::packages::ContentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Reference to one version of a repository, written `repository/number`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRef {
    pub repository: String,
    pub number: u64,
}

impl VersionRef {
    pub fn new(repository: impl Into<String>, number: u64) -> Self {
        Self {
            repository: repository.into(),
            number,
        }
    }
}

impl FromStr for VersionRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (repository, number) = s
            .trim_end_matches('/')
            .rsplit_once('/')
            .ok_or_else(|| {
                Error::InvalidRequest(format!("'{}' is not a repository/number reference", s))
            })?;
        let repository = repository.trim_end_matches("/versions");
        if repository.is_empty() {
            return Err(Error::InvalidRequest(format!("'{}' names no repository", s)));
        }
        let number = number
            .parse()
            .map_err(|_| Error::InvalidRequest(format!("'{}' has no valid version number", s)))?;
        Ok(Self::new(repository, number))
    }
}

impl TryFrom<String> for VersionRef {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<VersionRef> for String {
    fn from(r: VersionRef) -> Self {
        r.to_string()
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repository, self.number)
    }
}

/// One source → destination directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyMapping {
    pub source_repo_version: VersionRef,
    pub dest_repo: String,
    /// Version to layer the copy on; the latest version when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_base_version: Option<VersionRef>,
    /// Units to copy; all content of the source version when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentId>>,
}

/// A validated copy request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyRequest {
    pub config: Vec<CopyMapping>,
    #[serde(default = "default_dependency_solving")]
    pub dependency_solving: bool,
}

fn default_dependency_solving() -> bool {
    true
}

impl CopyRequest {
    pub fn new(config: Vec<CopyMapping>, dependency_solving: bool) -> Self {
        Self {
            config,
            dependency_solving,
        }
    }

    /// Parse and validate a JSON request
    pub fn from_json(json: &str) -> Result<Self> {
        let request: CopyRequest = serde_json::from_str(json)?;
        request.validate()?;
        Ok(request)
    }

    /// Read and validate a JSON request file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let request = Self::from_json(&content)?;
        debug!(
            "Loaded copy request with {} mappings from {}",
            request.config.len(),
            path.display()
        );
        Ok(request)
    }

    /// Reject requests that cannot describe a usable copy
    pub fn validate(&self) -> Result<()> {
        if self.config.is_empty() {
            return Err(Error::InvalidRequest("no copy mappings given".to_string()));
        }

        for (i, mapping) in self.config.iter().enumerate() {
            if mapping.dest_repo.trim().is_empty() {
                return Err(Error::InvalidRequest(format!("mapping {}: dest_repo is empty", i)));
            }
            if let Some(base) = &mapping.dest_base_version {
                if base.repository != mapping.dest_repo {
                    return Err(Error::InvalidRequest(format!(
                        "mapping {}: dest_base_version {} does not belong to {}",
                        i, base, mapping.dest_repo
                    )));
                }
            }
        }

        Ok(())
    }
}
