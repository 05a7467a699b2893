// src/cli.rs
//! CLI definitions for rpmcopy
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rpmcopy")]
#[command(author = "rpmcopy Contributors")]
#[command(version)]
#[command(
    about = "Dependency-aware content copy between RPM repository versions",
    long_about = None
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare two [epoch:]version[-release] strings
    Vercmp {
        /// Left-hand version
        left: String,

        /// Right-hand version
        right: String,
    },

    /// Parse a dependency expression and print its structure
    Parse {
        /// Dependency string, e.g. "(foo >= 1.0 or bar) if baz"
        expression: String,
    },

    /// Run a copy request against a JSON content store
    Copy {
        /// Path to the store file
        #[arg(short, long)]
        store: String,

        /// Path to the copy request (JSON)
        #[arg(short, long)]
        request: String,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<String>,

        /// Write the updated store back to its file
        #[arg(long)]
        write: bool,
    },
}
