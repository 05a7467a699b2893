// src/config.rs

//! Configuration file parsing
//!
//! Supports TOML configuration files with the following sections:
//! - [resolver] - Weak dependency policy, parallelism, modular filtering
//! - [copy] - Commit policy for copies with unresolved dependencies

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Resolver settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Copy settings
    #[serde(default)]
    pub copy: CopyConfig,
}

/// Resolver configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Also follow recommends/suggests/supplements/enhances
    #[serde(default)]
    pub weak_dependencies: bool,

    /// Expand each frontier wave on a worker pool
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Worker threads for parallel expansion (0 = rayon default)
    #[serde(default)]
    pub threads: usize,

    /// Treat rpmlib(...) requirements as always satisfied
    #[serde(default = "default_true")]
    pub skip_rpmlib: bool,

    /// Never pick artifacts of modules that are not being copied
    #[serde(default = "default_true")]
    pub modular_filtering: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            weak_dependencies: false,
            parallel: true,
            threads: 0,
            skip_rpmlib: true,
            modular_filtering: true,
        }
    }
}

/// Copy configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyConfig {
    /// Refuse to commit when a hard requirement stayed unresolved
    #[serde(default)]
    pub strict: bool,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.resolver.threads > 1024 {
            return Err(Error::ConfigError(format!(
                "resolver.threads = {} is not a sensible worker count",
                self.resolver.threads
            )));
        }
        Ok(())
    }
}
