// src/copy.rs

//! Copying content between repository versions
//!
//! A copy runs in two phases. First every mapping is planned: the source
//! and destination snapshots are loaded, the selection is resolved and the
//! selected advisories are reconciled. Nothing is written in this phase.
//! Then each destination gets exactly one new version.
//!
//! All destinations are locked before planning starts and stay locked until
//! their new versions are published, so the base a plan was computed
//! against cannot move underneath it.

use crate::advisory::{Advisory, AdvisoryReconciler, ReconcileOutcome};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::packages::{ContentId, Nevra, Package};
use crate::repository::{
    ContentStore, ContentUnits, CopyMapping, CopyRequest, RepositoryVersion, VersionRef,
};
use crate::resolver::{ContentUniverse, Diagnostics, Resolver};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Outcome of a copy for one destination repository
#[derive(Debug, Clone, Serialize)]
pub struct CopyReport {
    pub dest_repo: String,
    pub sources: Vec<VersionRef>,
    pub base_version: VersionRef,
    pub new_version: VersionRef,
    /// Units present in the new version but not in the base
    pub added: BTreeSet<ContentId>,
    /// Units of the base that the new version no longer has
    pub removed: BTreeSet<ContentId>,
    pub diagnostics: Diagnostics,
    pub advisories: Vec<ReconcileOutcome>,
}

/// Everything one destination will receive
struct DestinationPlan {
    repository: String,
    base: RepositoryVersion,
    sources: Vec<VersionRef>,
    added: BTreeSet<ContentId>,
    removed: BTreeSet<ContentId>,
    new_advisories: Vec<Advisory>,
    outcomes: Vec<ReconcileOutcome>,
    diagnostics: Diagnostics,
}

impl DestinationPlan {
    fn content(&self) -> BTreeSet<ContentId> {
        self.base.layered(&self.added, &self.removed)
    }
}

/// Holds a destination's write lock until dropped
struct WriteLock<'s, S: ContentStore + ?Sized> {
    store: &'s S,
    repository: String,
}

impl<'s, S: ContentStore + ?Sized> WriteLock<'s, S> {
    fn acquire(store: &'s S, repository: &str) -> Result<Self> {
        store.acquire(repository)?;
        debug!("Acquired write lock on {}", repository);
        Ok(Self {
            store,
            repository: repository.to_string(),
        })
    }
}

impl<S: ContentStore + ?Sized> Drop for WriteLock<'_, S> {
    fn drop(&mut self) {
        self.store.release(&self.repository);
        debug!("Released write lock on {}", self.repository);
    }
}

/// Runs copy requests against a store
pub struct Copier<'s, S: ContentStore + ?Sized> {
    store: &'s S,
    config: &'s Config,
}

impl<'s, S: ContentStore + ?Sized> Copier<'s, S> {
    pub fn new(store: &'s S, config: &'s Config) -> Self {
        Self { store, config }
    }

    /// Execute a request, returning one report per destination
    pub fn copy(&self, request: &CopyRequest) -> Result<Vec<CopyReport>> {
        request.validate()?;

        let mut by_destination: BTreeMap<&str, Vec<&CopyMapping>> = BTreeMap::new();
        for mapping in &request.config {
            by_destination.entry(mapping.dest_repo.as_str()).or_default().push(mapping);
        }

        // Sorted acquisition order keeps concurrent copies from deadlocking
        let _locks = by_destination
            .keys()
            .map(|repo| WriteLock::acquire(self.store, repo))
            .collect::<Result<Vec<_>>>()?;

        let mut plans = Vec::with_capacity(by_destination.len());
        for (repository, mappings) in &by_destination {
            plans.push(self.plan_destination(repository, mappings, request.dependency_solving)?);
        }

        if self.config.copy.strict {
            if let Some(plan) = plans.iter().find(|p| p.diagnostics.unresolved_count() > 0) {
                return Err(Error::UnresolvedDependencies {
                    repository: plan.repository.clone(),
                    count: plan.diagnostics.unresolved_count(),
                });
            }
        }

        plans.into_iter().map(|plan| self.commit(plan)).collect()
    }

    fn plan_destination(
        &self,
        repository: &str,
        mappings: &[&CopyMapping],
        dependency_solving: bool,
    ) -> Result<DestinationPlan> {
        let base = match &mappings[0].dest_base_version {
            Some(reference) => self.store.version(reference)?,
            None => self.store.latest_version(repository)?,
        };
        for mapping in &mappings[1..] {
            if let Some(other) = &mapping.dest_base_version {
                if *other != base.reference() {
                    return Err(Error::InvalidRequest(format!(
                        "conflicting base versions {} and {} for {}",
                        base.reference(),
                        other,
                        repository
                    )));
                }
            }
        }

        let mut plan = DestinationPlan {
            repository: repository.to_string(),
            base,
            sources: Vec::new(),
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
            new_advisories: Vec::new(),
            outcomes: Vec::new(),
            diagnostics: Diagnostics::new(),
        };

        for mapping in mappings {
            self.plan_mapping(mapping, dependency_solving, &mut plan)?;
        }
        Ok(plan)
    }

    /// Resolve one mapping against the destination as planned so far
    fn plan_mapping(
        &self,
        mapping: &CopyMapping,
        dependency_solving: bool,
        plan: &mut DestinationPlan,
    ) -> Result<()> {
        let source = self.store.version(&mapping.source_repo_version)?;
        let selection: BTreeSet<ContentId> = match &mapping.content {
            Some(ids) => {
                if let Some(stray) = ids.iter().find(|id| !source.content.contains(*id)) {
                    return Err(Error::InvalidRequest(format!(
                        "{} is not part of {}",
                        stray,
                        source.reference()
                    )));
                }
                ids.iter().cloned().collect()
            }
            None => source.content.clone(),
        };

        let source_units = self.store.units(&source.content)?;
        let destination_units = self.destination_units(plan)?;

        let mut universe = ContentUniverse::new();
        for package in destination_units.packages {
            universe.mark_in_destination(package.content_id.clone());
            universe.add_package(package);
        }
        for module in destination_units.modules {
            universe.mark_in_destination(module.content_id.clone());
            universe.add_module(module);
        }
        for package in &source_units.packages {
            if !universe.in_destination(&package.content_id) {
                universe.add_package(package.clone());
            }
        }
        for module in &source_units.modules {
            if !universe.in_destination(&module.content_id) {
                universe.add_module(module.clone());
            }
        }

        let advisories: Vec<&Advisory> = source_units
            .advisories
            .iter()
            .filter(|a| selection.contains(&a.content_id))
            .collect();

        let mut seed: BTreeSet<ContentId> = selection
            .iter()
            .filter(|id| !advisories.iter().any(|a| &a.content_id == *id))
            .cloned()
            .collect();
        let children = advisory_children(&advisories, &source_units.packages);
        if !children.is_empty() {
            debug!("{} packages referenced by selected advisories", children.len());
        }
        seed.extend(children);

        let resolver = Resolver::new(self.config.resolver.clone());
        let resolution = resolver.resolve(&universe, &seed, dependency_solving);
        plan.added.extend(resolution.resolved_content);
        plan.diagnostics.merge(resolution.diagnostics);

        let existing: HashMap<&str, &Advisory> = destination_units
            .advisories
            .iter()
            .map(|a| (a.id.as_str(), a))
            .collect();
        for advisory in advisories {
            let outcome = AdvisoryReconciler::reconcile(
                advisory,
                existing.get(advisory.id.as_str()).copied(),
                &mut plan.diagnostics,
            );
            if let Some(previous) = outcome.outgoing() {
                plan.removed.insert(previous.clone());
                plan.added.remove(previous);
                plan.new_advisories.retain(|a| &a.content_id != previous);
            }
            if let Some(incoming) = outcome.incoming() {
                plan.added.insert(incoming.content_id.clone());
                if matches!(outcome, ReconcileOutcome::Merged { .. }) {
                    plan.new_advisories.push(incoming.clone());
                }
            }
            plan.outcomes.push(outcome);
        }

        plan.sources.push(source.reference());
        Ok(())
    }

    /// Units of the destination as planned so far
    ///
    /// Merged advisories of earlier mappings are not in the store until
    /// commit, so they are taken from the plan.
    fn destination_units(&self, plan: &DestinationPlan) -> Result<ContentUnits> {
        let pending: BTreeSet<&ContentId> =
            plan.new_advisories.iter().map(|a| &a.content_id).collect();
        let stored: BTreeSet<ContentId> = plan
            .content()
            .into_iter()
            .filter(|id| !pending.contains(id))
            .collect();

        let mut units = self.store.units(&stored)?;
        units.advisories.extend(plan.new_advisories.iter().cloned());
        Ok(units)
    }

    fn commit(&self, plan: DestinationPlan) -> Result<CopyReport> {
        let content = plan.content();
        let added: BTreeSet<ContentId> = content.difference(&plan.base.content).cloned().collect();
        let removed: BTreeSet<ContentId> =
            plan.base.content.difference(&content).cloned().collect();

        for advisory in plan.new_advisories {
            self.store.add_advisory(advisory)?;
        }
        let version = self.store.commit(&plan.repository, content)?;

        if plan.diagnostics.unresolved_count() > 0 {
            warn!(
                "{} committed with {} unresolved dependencies",
                version.reference(),
                plan.diagnostics.unresolved_count()
            );
        }
        info!(
            "Copied into {}: {} added, {} removed",
            version.reference(),
            added.len(),
            removed.len()
        );

        Ok(CopyReport {
            dest_repo: plan.repository,
            sources: plan.sources,
            base_version: plan.base.reference(),
            new_version: version.reference(),
            added,
            removed,
            diagnostics: plan.diagnostics,
            advisories: plan.outcomes,
        })
    }
}

/// Run a copy request with the given configuration
pub fn copy<S: ContentStore + ?Sized>(
    store: &S,
    request: &CopyRequest,
    config: &Config,
) -> Result<Vec<CopyReport>> {
    Copier::new(store, config).copy(request)
}

/// Source packages listed by any of the advisories
fn advisory_children(advisories: &[&Advisory], packages: &[Package]) -> BTreeSet<ContentId> {
    let wanted: BTreeSet<Nevra> = advisories.iter().flat_map(|a| a.package_nevras()).collect();
    packages
        .iter()
        .filter(|p| wanted.contains(&p.nevra))
        .map(|p| p.content_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::Relation;
    use crate::repository::InMemoryStore;

    fn pkg(id: &str, requires: &[&str]) -> Package {
        let mut p = Package::new(id, Nevra::new(id, "0", "1.0", "1", "noarch"));
        p.requires = requires.iter().map(|s| Relation::from(*s)).collect();
        p
    }

    fn ids(ids: &[&str]) -> BTreeSet<ContentId> {
        ids.iter().map(|id| ContentId::from(*id)).collect()
    }

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.add_package(pkg("a", &["b"]));
        store.add_package(pkg("b", &[]));
        store.add_package(pkg("c", &["missing"]));
        store.publish("fedora", ids(&["a", "b", "c"]));
        store.create_repository("stable");
        store
    }

    fn request(content: &[&str], dependency_solving: bool) -> CopyRequest {
        CopyRequest::new(
            vec![CopyMapping {
                source_repo_version: VersionRef::new("fedora", 0),
                dest_repo: "stable".to_string(),
                dest_base_version: None,
                content: Some(content.iter().map(|id| ContentId::from(*id)).collect()),
            }],
            dependency_solving,
        )
    }

    #[test]
    fn test_copy_with_dependencies() {
        let store = store();
        let reports = copy(&store, &request(&["a"], true), &Config::default()).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].added, ids(&["a", "b"]));
        assert_eq!(reports[0].new_version, VersionRef::new("stable", 1));
        assert_eq!(store.latest_version("stable").unwrap().content, ids(&["a", "b"]));
    }

    #[test]
    fn test_copy_without_dependency_solving() {
        let store = store();
        let reports = copy(&store, &request(&["a"], false), &Config::default()).unwrap();
        assert_eq!(reports[0].added, ids(&["a"]));
    }

    #[test]
    fn test_content_must_come_from_source() {
        let store = store();
        store.add_package(pkg("z", &[]));
        let err = copy(&store, &request(&["z"], true), &Config::default());
        assert!(matches!(err, Err(Error::InvalidRequest(_))));
        // Lock was released on the error path
        assert!(store.acquire("stable").is_ok());
    }

    #[test]
    fn test_strict_mode_refuses_unresolved() {
        let store = store();
        let mut config = Config::default();
        config.copy.strict = true;

        let err = copy(&store, &request(&["c"], true), &config);
        assert!(matches!(err, Err(Error::UnresolvedDependencies { count: 1, .. })));
        assert_eq!(store.latest_version("stable").unwrap().number, 0);

        let reports = copy(&store, &request(&["c"], true), &Config::default()).unwrap();
        assert_eq!(reports[0].diagnostics.unresolved_count(), 1);
        assert_eq!(reports[0].added, ids(&["c"]));
    }

    #[test]
    fn test_busy_destination() {
        let store = store();
        store.acquire("stable").unwrap();
        let err = copy(&store, &request(&["a"], true), &Config::default());
        assert!(matches!(err, Err(Error::DestinationBusy(_))));
    }
}
