// src/packages/module.rs

//! Module streams (modulemd units)
//!
//! A module references packages; it does not own them. The same package may
//! be listed by several modules or by none.

use super::ContentId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A module stream build: name:stream:version:context:arch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleUnit {
    pub content_id: ContentId,
    pub name: String,
    pub stream: String,
    pub version: u64,
    pub context: String,
    pub arch: String,
    /// Profile name → package names installed by that profile
    #[serde(default)]
    pub profiles: BTreeMap<String, Vec<String>>,
    /// The packages built for this module (its artifacts)
    #[serde(default)]
    pub packages: Vec<ContentId>,
    /// Artifacts must be copied as an exact set
    #[serde(default)]
    pub static_context: bool,
}

impl ModuleUnit {
    pub fn new(
        content_id: impl Into<String>,
        name: impl Into<String>,
        stream: impl Into<String>,
        version: u64,
        context: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            content_id: ContentId::new(content_id),
            name: name.into(),
            stream: stream.into(),
            version,
            context: context.into(),
            arch: arch.into(),
            profiles: BTreeMap::new(),
            packages: Vec::new(),
            static_context: false,
        }
    }

    /// Distinct package names across all profiles, sorted
    pub fn profile_package_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .profiles
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl fmt::Display for ModuleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.name, self.stream, self.version, self.context, self.arch
        )
    }
}
