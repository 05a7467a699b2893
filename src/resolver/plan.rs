// src/resolver/plan.rs

//! Resolution input and output data structures
//!
//! The candidate universe is materialized in memory before resolution
//! starts; the result is the closed content set plus diagnostics.

use super::conflict::Diagnostics;
use crate::packages::{ContentId, ModuleUnit, Package};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Every package and module the resolver may look at
///
/// Built from the seed plus the source and destination snapshots. Units
/// that are already part of the destination are marked so providers there
/// win ties.
#[derive(Debug, Clone, Default)]
pub struct ContentUniverse {
    packages: BTreeMap<ContentId, Package>,
    modules: BTreeMap<ContentId, ModuleUnit>,
    destination: BTreeSet<ContentId>,
}

impl ContentUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_package(&mut self, package: Package) {
        self.packages.insert(package.content_id.clone(), package);
    }

    pub fn add_module(&mut self, module: ModuleUnit) {
        self.modules.insert(module.content_id.clone(), module);
    }

    /// Mark a unit as already present in the destination snapshot
    pub fn mark_in_destination(&mut self, id: ContentId) {
        self.destination.insert(id);
    }

    pub fn with_package(mut self, package: Package) -> Self {
        self.add_package(package);
        self
    }

    pub fn with_module(mut self, module: ModuleUnit) -> Self {
        self.add_module(module);
        self
    }

    /// Add a package that the destination already contains
    pub fn with_destination_package(mut self, package: Package) -> Self {
        self.mark_in_destination(package.content_id.clone());
        self.add_package(package);
        self
    }

    pub fn package(&self, id: &ContentId) -> Option<&Package> {
        self.packages.get(id)
    }

    pub fn module(&self, id: &ContentId) -> Option<&ModuleUnit> {
        self.modules.get(id)
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleUnit> {
        self.modules.values()
    }

    pub fn in_destination(&self, id: &ContentId) -> bool {
        self.destination.contains(id)
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }
}

/// Result of a resolution run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    /// The seed plus everything pulled in for it
    pub resolved_content: BTreeSet<ContentId>,
    /// Units added on top of the seed
    pub added: BTreeSet<ContentId>,
    /// Problems found along the way
    pub diagnostics: Diagnostics,
}
