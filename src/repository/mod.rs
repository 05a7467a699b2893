// src/repository/mod.rs

//! Repository snapshots and the storage seam
//!
//! This module provides:
//! - Immutable repository versions
//! - Copy requests and their validation
//! - The [`ContentStore`] trait the copy workflow talks to
//! - An in-memory store backed by a JSON file

mod request;
mod store;

pub use request::{CopyMapping, CopyRequest, VersionRef};
pub use store::{InMemoryStore, StoreSnapshot};

use crate::advisory::Advisory;
use crate::error::Result;
use crate::packages::{ContentId, ModuleUnit, Package};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One published version of a repository
///
/// Versions are never edited; a copy produces a new version layered on an
/// existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryVersion {
    pub repository: String,
    pub number: u64,
    #[serde(default)]
    pub content: BTreeSet<ContentId>,
}

impl RepositoryVersion {
    /// Version 0 of a new, empty repository
    pub fn empty(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            number: 0,
            content: BTreeSet::new(),
        }
    }

    pub fn reference(&self) -> VersionRef {
        VersionRef::new(self.repository.clone(), self.number)
    }

    /// Content of a version built on this one
    pub fn layered(
        &self,
        added: &BTreeSet<ContentId>,
        removed: &BTreeSet<ContentId>,
    ) -> BTreeSet<ContentId> {
        self.content
            .iter()
            .filter(|id| !removed.contains(*id))
            .chain(added.iter())
            .cloned()
            .collect()
    }
}

/// Metadata of a set of content units, grouped by type
#[derive(Debug, Clone, Default)]
pub struct ContentUnits {
    pub packages: Vec<Package>,
    pub modules: Vec<ModuleUnit>,
    pub advisories: Vec<Advisory>,
}

/// Storage collaborator for the copy workflow
///
/// Implementations must let only one writer commit to a destination at a
/// time: [`ContentStore::acquire`] fails with `DestinationBusy` while
/// another copy holds the repository.
pub trait ContentStore {
    /// A specific repository version
    fn version(&self, reference: &VersionRef) -> Result<RepositoryVersion>;

    /// The newest version of a repository
    fn latest_version(&self, repository: &str) -> Result<RepositoryVersion>;

    /// Metadata for the given units; unknown ids are an error
    fn units(&self, ids: &BTreeSet<ContentId>) -> Result<ContentUnits>;

    /// Register a newly created advisory record
    fn add_advisory(&self, advisory: Advisory) -> Result<()>;

    /// Take the write lock for a repository
    fn acquire(&self, repository: &str) -> Result<()>;

    /// Give the write lock back
    fn release(&self, repository: &str);

    /// Publish `content` as the next version of `repository`
    fn commit(&self, repository: &str, content: BTreeSet<ContentId>) -> Result<RepositoryVersion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layered_content() {
        let base = RepositoryVersion {
            repository: "stable".to_string(),
            number: 4,
            content: ["a", "b"].into_iter().map(ContentId::from).collect(),
        };
        let added = ["c"].into_iter().map(ContentId::from).collect();
        let removed = ["a"].into_iter().map(ContentId::from).collect();

        let content = base.layered(&added, &removed);
        let expected: BTreeSet<ContentId> = ["b", "c"].into_iter().map(ContentId::from).collect();
        assert_eq!(content, expected);
        assert_eq!(base.reference().to_string(), "stable/4");
    }
}
