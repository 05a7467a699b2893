// src/resolver/modular.rs

//! Module-level membership rules
//!
//! Module membership is a back-reference: a package listed as a module
//! artifact is not pulled in just because its module exists. Modules only
//! contribute packages when the copy selects them explicitly:
//!
//! - a static-context module brings its exact artifact set, no substitution
//! - a dynamic module brings one package per profile name, preferring its
//!   own artifacts and falling back to the provides index
//!
//! Artifacts of modules that are *not* being copied are kept out of the
//! closure, so resolving a plain package never drags in a modular build of
//! one of its dependencies.

use super::conflict::{Diagnostic, Diagnostics};
use super::index::ProvidesIndex;
use super::plan::ContentUniverse;
use crate::packages::{Capability, ContentId, ModuleUnit, RelationKind};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Applies module membership rules for one copy
pub struct ModularContextResolver<'u> {
    universe: &'u ContentUniverse,
    selected: Vec<&'u ModuleUnit>,
}

impl<'u> ModularContextResolver<'u> {
    /// Modules present in `seed` count as explicitly selected
    pub fn new(universe: &'u ContentUniverse, seed: &BTreeSet<ContentId>) -> Self {
        let selected: Vec<&ModuleUnit> = seed.iter().filter_map(|id| universe.module(id)).collect();
        if !selected.is_empty() {
            debug!(
                "Selected modules: {}",
                selected.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(", ")
            );
        }
        Self { universe, selected }
    }

    pub fn selected_modules(&self) -> &[&'u ModuleUnit] {
        &self.selected
    }

    /// Artifacts the resolver must not choose as providers
    ///
    /// Packages of unselected modules, minus anything the destination already
    /// has or the caller asked for directly.
    pub fn excluded_packages(&self, seed: &BTreeSet<ContentId>) -> BTreeSet<ContentId> {
        let selected: BTreeSet<&ContentId> = self.selected.iter().map(|m| &m.content_id).collect();

        let excluded: BTreeSet<ContentId> = self
            .universe
            .modules()
            .filter(|m| !selected.contains(&m.content_id))
            .flat_map(|m| m.packages.iter())
            .filter(|id| !seed.contains(*id) && !self.universe.in_destination(id))
            .filter(|id| {
                // An artifact shared with a selected module stays eligible
                !self.selected.iter().any(|m| m.packages.contains(id))
            })
            .cloned()
            .collect();

        debug!("{} modular artifacts excluded from provider selection", excluded.len());
        excluded
    }

    /// Packages the selected modules bring into the copy
    pub fn module_packages(
        &self,
        index: &ProvidesIndex<'_>,
        diagnostics: &mut Diagnostics,
    ) -> BTreeSet<ContentId> {
        let mut packages = BTreeSet::new();

        for module in &self.selected {
            let before = packages.len();
            if module.static_context {
                self.static_artifacts(module, &mut packages, diagnostics);
            } else {
                self.profile_packages(module, index, &mut packages, diagnostics);
            }
            info!(
                "Module {} contributes {} packages",
                module,
                packages.len() - before
            );
        }

        packages
    }

    fn static_artifacts(
        &self,
        module: &ModuleUnit,
        packages: &mut BTreeSet<ContentId>,
        diagnostics: &mut Diagnostics,
    ) {
        for id in &module.packages {
            if self.universe.package(id).is_some() {
                packages.insert(id.clone());
            } else {
                diagnostics.push(missing(module, id.as_str()));
            }
        }
    }

    fn profile_packages(
        &self,
        module: &ModuleUnit,
        index: &ProvidesIndex<'_>,
        packages: &mut BTreeSet<ContentId>,
        diagnostics: &mut Diagnostics,
    ) {
        for name in module.profile_package_names() {
            let own: BTreeSet<ContentId> = module
                .packages
                .iter()
                .filter(|id| self.universe.package(id).is_some_and(|p| p.name() == name))
                .cloned()
                .collect();

            let chosen = index
                .best_of(&own)
                .or_else(|| index.best_candidate(&Capability::named(name)));

            match chosen {
                Some(idx) => {
                    packages.insert(index.package(idx).content_id.clone());
                }
                None => diagnostics.push(missing(module, name)),
            }
        }
    }
}

fn missing(module: &ModuleUnit, requirement: &str) -> Diagnostic {
    Diagnostic::UnresolvedDependency {
        package: module.to_string(),
        relation: RelationKind::Requires,
        requirement: requirement.to_string(),
        missing: vec![requirement.to_string()],
    }
}
