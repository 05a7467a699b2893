// src/repository/store.rs

//! In-memory content store
//!
//! Holds repositories and unit metadata in memory and can be loaded from
//! or written back to a JSON file. Used by the command line front-end and
//! the tests.

use super::{ContentStore, ContentUnits, RepositoryVersion, VersionRef};
use crate::advisory::Advisory;
use crate::error::{Error, Result};
use crate::packages::{ContentId, ModuleUnit, Package};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// On-disk form of a store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSnapshot {
    /// Repository name → its versions, oldest first
    #[serde(default)]
    pub repositories: BTreeMap<String, Vec<RepositoryVersion>>,
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub modules: Vec<ModuleUnit>,
    #[serde(default)]
    pub advisories: Vec<Advisory>,
}

#[derive(Debug, Default)]
struct StoreData {
    repositories: BTreeMap<String, Vec<RepositoryVersion>>,
    packages: BTreeMap<ContentId, Package>,
    modules: BTreeMap<ContentId, ModuleUnit>,
    advisories: BTreeMap<ContentId, Advisory>,
}

/// A [`ContentStore`] kept entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<StoreData>,
    writers: Mutex<BTreeSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut data = StoreData::default();
        for (name, mut versions) in snapshot.repositories {
            for version in &mut versions {
                version.repository = name.clone();
            }
            versions.sort_by_key(|v| v.number);
            data.repositories.insert(name, versions);
        }
        data.packages = snapshot
            .packages
            .into_iter()
            .map(|p| (p.content_id.clone(), p))
            .collect();
        data.modules = snapshot
            .modules
            .into_iter()
            .map(|m| (m.content_id.clone(), m))
            .collect();
        data.advisories = snapshot
            .advisories
            .into_iter()
            .map(|a| (a.content_id.clone(), a))
            .collect();

        Self {
            data: RwLock::new(data),
            writers: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        StoreSnapshot {
            repositories: data.repositories.clone(),
            packages: data.packages.values().cloned().collect(),
            modules: data.modules.values().cloned().collect(),
            advisories: data.advisories.values().cloned().collect(),
        }
    }

    /// Load a store from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;
        debug!(
            "Loaded store from {}: {} repositories, {} packages",
            path.display(),
            snapshot.repositories.len(),
            snapshot.packages.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the store to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Create a repository with an empty version 0, if it does not exist
    pub fn create_repository(&self, name: &str) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.repositories
            .entry(name.to_string())
            .or_insert_with(|| vec![RepositoryVersion::empty(name)]);
    }

    pub fn add_package(&self, package: Package) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.packages.insert(package.content_id.clone(), package);
    }

    pub fn add_module(&self, module: ModuleUnit) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.modules.insert(module.content_id.clone(), module);
    }

    /// Publish a version directly, bypassing the copy workflow
    pub fn publish(&self, repository: &str, content: BTreeSet<ContentId>) -> RepositoryVersion {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        let versions = data.repositories.entry(repository.to_string()).or_default();
        let number = versions.last().map_or(0, |v| v.number + 1);
        let version = RepositoryVersion {
            repository: repository.to_string(),
            number,
            content,
        };
        versions.push(version.clone());
        version
    }

    pub fn advisory(&self, id: &ContentId) -> Option<Advisory> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.advisories.get(id).cloned()
    }
}

impl ContentStore for InMemoryStore {
    fn version(&self, reference: &VersionRef) -> Result<RepositoryVersion> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.repositories
            .get(&reference.repository)
            .and_then(|versions| versions.iter().find(|v| v.number == reference.number))
            .cloned()
            .ok_or_else(|| Error::NotFoundError(format!("repository version {}", reference)))
    }

    fn latest_version(&self, repository: &str) -> Result<RepositoryVersion> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.repositories
            .get(repository)
            .and_then(|versions| versions.last())
            .cloned()
            .ok_or_else(|| Error::NotFoundError(format!("repository '{}'", repository)))
    }

    fn units(&self, ids: &BTreeSet<ContentId>) -> Result<ContentUnits> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        let mut units = ContentUnits::default();

        for id in ids {
            if let Some(package) = data.packages.get(id) {
                units.packages.push(package.clone());
            } else if let Some(module) = data.modules.get(id) {
                units.modules.push(module.clone());
            } else if let Some(advisory) = data.advisories.get(id) {
                units.advisories.push(advisory.clone());
            } else {
                return Err(Error::NotFoundError(format!("content unit {}", id)));
            }
        }

        Ok(units)
    }

    fn add_advisory(&self, advisory: Advisory) -> Result<()> {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.advisories.insert(advisory.content_id.clone(), advisory);
        Ok(())
    }

    fn acquire(&self, repository: &str) -> Result<()> {
        let mut writers = self.writers.lock().unwrap_or_else(|e| e.into_inner());
        if !writers.insert(repository.to_string()) {
            return Err(Error::DestinationBusy(repository.to_string()));
        }
        Ok(())
    }

    fn release(&self, repository: &str) {
        let mut writers = self.writers.lock().unwrap_or_else(|e| e.into_inner());
        writers.remove(repository);
    }

    fn commit(&self, repository: &str, content: BTreeSet<ContentId>) -> Result<RepositoryVersion> {
        {
            let writers = self.writers.lock().unwrap_or_else(|e| e.into_inner());
            if !writers.contains(repository) {
                return Err(Error::InvalidRequest(format!(
                    "commit to '{}' without holding its write lock",
                    repository
                )));
            }
        }

        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        let versions = data
            .repositories
            .get_mut(repository)
            .ok_or_else(|| Error::NotFoundError(format!("repository '{}'", repository)))?;
        let number = versions.last().map_or(0, |v| v.number + 1);
        let version = RepositoryVersion {
            repository: repository.to_string(),
            number,
            content,
        };
        versions.push(version.clone());

        info!(
            "Published {} with {} units",
            version.reference(),
            version.content.len()
        );
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::Nevra;

    fn ids(ids: &[&str]) -> BTreeSet<ContentId> {
        ids.iter().map(|id| ContentId::from(*id)).collect()
    }

    #[test]
    fn test_single_writer_per_destination() {
        let store = InMemoryStore::new();
        store.create_repository("stable");

        store.acquire("stable").unwrap();
        assert!(matches!(store.acquire("stable"), Err(Error::DestinationBusy(_))));
        assert!(store.acquire("testing").is_ok());

        store.release("stable");
        assert!(store.acquire("stable").is_ok());
    }

    #[test]
    fn test_commit_requires_lock_and_appends() {
        let store = InMemoryStore::new();
        store.create_repository("stable");
        assert!(store.commit("stable", ids(&["a"])).is_err());

        store.acquire("stable").unwrap();
        let v1 = store.commit("stable", ids(&["a"])).unwrap();
        assert_eq!(v1.number, 1);
        assert_eq!(store.latest_version("stable").unwrap(), v1);
        assert!(store.version(&VersionRef::new("stable", 0)).unwrap().content.is_empty());
    }

    #[test]
    fn test_units_by_type() {
        let store = InMemoryStore::new();
        store.add_package(Package::new("p", Nevra::new("p", "0", "1", "1", "noarch")));
        store.add_module(ModuleUnit::new("m", "m", "1", 1, "c", "noarch"));

        let units = store.units(&ids(&["p", "m"])).unwrap();
        assert_eq!(units.packages.len(), 1);
        assert_eq!(units.modules.len(), 1);
        assert!(matches!(store.units(&ids(&["ghost"])), Err(Error::NotFoundError(_))));
    }

    #[test]
    fn test_save_and_load() {
        let store = InMemoryStore::new();
        store.add_package(Package::new("p", Nevra::new("p", "0", "1", "1", "noarch")));
        store.publish("fedora", ids(&["p"]));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        store.save(&path).unwrap();

        let loaded = InMemoryStore::load(&path).unwrap();
        assert_eq!(loaded.latest_version("fedora").unwrap().content, ids(&["p"]));
        assert_eq!(loaded.units(&ids(&["p"])).unwrap().packages.len(), 1);
    }
}
