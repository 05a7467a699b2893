// src/resolver/mod.rs

//! Copy-time dependency resolution
//!
//! Given a candidate universe (seed, source snapshot and destination
//! snapshot) and a seed set, work out what has to be copied along:
//!
//! 1. module rules decide which modular packages are off limits and which
//!    packages selected modules bring with them
//! 2. the dependency resolver closes the result under requires (and weak
//!    relations, when configured)
//!
//! Resolution never fails. Everything that goes wrong ends up in the
//! returned [`Diagnostics`].

pub mod conflict;
mod engine;
mod index;
mod modular;
mod plan;

pub use conflict::{Diagnostic, Diagnostics};
pub use engine::{Closure, DependencyResolver};
pub use index::{Candidate, PackageIdx, ProvidesIndex};
pub use modular::ModularContextResolver;
pub use plan::{ContentUniverse, Resolution};

use crate::config::ResolverConfig;
use crate::packages::ContentId;
use std::collections::BTreeSet;
use tracing::info;

/// Resolver entry point holding the policy for a run
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `seed` against `universe`
    ///
    /// Seed ids that are not packages (modules, advisories) are passed
    /// through unchanged. With `dependency_solving` off, only module
    /// contributions are added.
    pub fn resolve(
        &self,
        universe: &ContentUniverse,
        seed: &BTreeSet<ContentId>,
        dependency_solving: bool,
    ) -> Resolution {
        let mut diagnostics = Diagnostics::new();

        let modular = ModularContextResolver::new(universe, seed);
        let excluded = if self.config.modular_filtering {
            modular.excluded_packages(seed)
        } else {
            BTreeSet::new()
        };
        let index = ProvidesIndex::build(universe).exclude(&excluded);

        let mut resolved = seed.clone();
        resolved.extend(modular.module_packages(&index, &mut diagnostics));

        if dependency_solving {
            let start: Vec<PackageIdx> =
                resolved.iter().filter_map(|id| index.index_of(id)).collect();
            let closure = DependencyResolver::new(&index, &self.config).close(&start);
            resolved.extend(
                closure
                    .members
                    .iter()
                    .map(|&idx| index.package(idx).content_id.clone()),
            );
            diagnostics.merge(closure.diagnostics);
        }

        let added: BTreeSet<ContentId> = resolved.difference(seed).cloned().collect();
        info!(
            "Resolved {} seed units to {} units ({} added, {} diagnostics)",
            seed.len(),
            resolved.len(),
            added.len(),
            diagnostics.len()
        );

        Resolution {
            resolved_content: resolved,
            added,
            diagnostics,
        }
    }
}

/// Resolve with the default policy
pub fn resolve(
    universe: &ContentUniverse,
    seed: &BTreeSet<ContentId>,
    dependency_solving: bool,
) -> Resolution {
    Resolver::default().resolve(universe, seed, dependency_solving)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::{ModuleUnit, Nevra, Package, Relation};

    fn pkg(id: &str, requires: &[&str]) -> Package {
        let mut p = Package::new(id, Nevra::new(id, "0", "1.0", "1", "noarch"));
        p.requires = requires.iter().map(|s| Relation::from(*s)).collect();
        p
    }

    fn ids(ids: &[&str]) -> BTreeSet<ContentId> {
        ids.iter().map(|id| ContentId::from(*id)).collect()
    }

    #[test]
    fn test_without_dependency_solving_seed_is_kept_as_is() {
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["b"]))
            .with_package(pkg("b", &[]));
        let resolution = resolve(&universe, &ids(&["a"]), false);
        assert_eq!(resolution.resolved_content, ids(&["a"]));
        assert!(resolution.added.is_empty());
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn test_non_package_ids_pass_through() {
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["b"]))
            .with_package(pkg("b", &[]));
        let resolution = resolve(&universe, &ids(&["a", "advisory-1"]), true);
        assert_eq!(resolution.resolved_content, ids(&["a", "advisory-1", "b"]));
        assert_eq!(resolution.added, ids(&["b"]));
    }

    #[test]
    fn test_modular_filtering_avoids_unselected_modules() {
        let mut modular_lib = pkg("lib-mod", &[]);
        modular_lib.nevra = Nevra::new("lib", "0", "9.0", "1", "noarch");
        let mut plain_lib = pkg("lib-plain", &[]);
        plain_lib.nevra = Nevra::new("lib", "0", "1.0", "1", "noarch");
        let mut module = ModuleUnit::new("m-lib", "lib", "9", 1, "c0ffee", "noarch");
        module.packages = vec![ContentId::from("lib-mod")];

        let universe = ContentUniverse::new()
            .with_package(pkg("app", &["lib"]))
            .with_package(modular_lib)
            .with_package(plain_lib)
            .with_module(module);

        let resolution = resolve(&universe, &ids(&["app"]), true);
        assert_eq!(resolution.added, ids(&["lib-plain"]));

        let unfiltered = Resolver::new(ResolverConfig {
            modular_filtering: false,
            ..ResolverConfig::default()
        });
        let resolution = unfiltered.resolve(&universe, &ids(&["app"]), true);
        assert_eq!(resolution.added, ids(&["lib-mod"]));
    }

    #[test]
    fn test_module_contributions_without_dependency_solving() {
        let mut module = ModuleUnit::new("m", "tool", "1", 1, "ctx", "noarch");
        module.packages = vec![ContentId::from("a")];
        module.static_context = true;
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["b"]))
            .with_package(pkg("b", &[]))
            .with_module(module);

        let resolution = resolve(&universe, &ids(&["m"]), false);
        assert_eq!(resolution.resolved_content, ids(&["a", "m"]));

        let resolution = resolve(&universe, &ids(&["m"]), true);
        assert_eq!(resolution.resolved_content, ids(&["a", "b", "m"]));
    }
}
