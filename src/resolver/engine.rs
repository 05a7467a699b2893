// src/resolver/engine.rs

//! Dependency closure over a provides index
//!
//! The resolver grows a closure from a seed set in waves. Every package of
//! a wave is evaluated against the closure as it stood when the wave began,
//! and all additions are merged once the wave is done. Because no package
//! sees another's additions mid-wave, the outcome does not depend on how
//! the wave is sharded across worker threads.
//!
//! When the frontier drains, a verification pass re-evaluates the whole
//! closure. Conditional requirements (`if`/`unless`) and reverse weak
//! dependencies can only be judged once everything else has arrived, so
//! anything the pass adds starts another round of waves. Unresolved
//! requirements are reported from the final pass only.

use super::conflict::{Diagnostic, Diagnostics};
use super::index::{PackageIdx, ProvidesIndex};
use crate::config::ResolverConfig;
use crate::dependencies::{DepExpr, ExpressionCache, Satisfier, is_rpmlib};
use crate::error::Error;
use crate::packages::{Capability, ContentId, Package, Relation, RelationKind};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Either the packages to add, or the requirements nobody provides
type Plan = std::result::Result<Vec<PackageIdx>, Vec<String>>;

/// Outcome of closing a seed set
#[derive(Debug, Default)]
pub struct Closure {
    pub members: BTreeSet<PackageIdx>,
    pub diagnostics: Diagnostics,
    /// Number of frontier waves processed, verification passes included
    pub waves: usize,
}

#[derive(Debug, Default)]
struct Expansion {
    additions: Vec<PackageIdx>,
    diagnostics: Vec<Diagnostic>,
}

impl Expansion {
    fn absorb(&mut self, other: Expansion) {
        self.additions.extend(other.additions);
        self.diagnostics.extend(other.diagnostics);
    }
}

/// Satisfaction against the packages already in the closure
struct ClosureView<'r, 'u> {
    index: &'r ProvidesIndex<'u>,
    closure: &'r [bool],
    skip_rpmlib: bool,
    /// A package never satisfies its own conflicts
    ignore: Option<PackageIdx>,
}

impl ClosureView<'_, '_> {
    fn member(&self, idx: PackageIdx) -> bool {
        self.closure[idx] && self.ignore != Some(idx)
    }

    fn provided_by_closure(&self, cap: &Capability) -> bool {
        self.index
            .providers(cap)
            .iter()
            .any(|c| self.member(c.package))
    }
}

impl Satisfier for ClosureView<'_, '_> {
    fn satisfies(&self, cap: &Capability) -> bool {
        if self.skip_rpmlib && is_rpmlib(&cap.name) {
            return true;
        }
        self.provided_by_closure(cap)
    }

    fn providers(&self, cap: &Capability) -> BTreeSet<ContentId> {
        self.index
            .providers(cap)
            .into_iter()
            .filter(|c| self.member(c.package))
            .map(|c| self.index.package(c.package).content_id.clone())
            .collect()
    }
}

/// Satisfaction against everything that could still be added
struct CandidateView<'r, 'u> {
    index: &'r ProvidesIndex<'u>,
    closure: &'r [bool],
}

impl Satisfier for CandidateView<'_, '_> {
    fn satisfies(&self, cap: &Capability) -> bool {
        !Satisfier::providers(self, cap).is_empty()
    }

    fn providers(&self, cap: &Capability) -> BTreeSet<ContentId> {
        self.index
            .providers(cap)
            .into_iter()
            .filter(|c| self.closure[c.package] || self.index.is_eligible(c.package))
            .map(|c| self.index.package(c.package).content_id.clone())
            .collect()
    }
}

/// Fixpoint dependency resolver
pub struct DependencyResolver<'r, 'u> {
    index: &'r ProvidesIndex<'u>,
    config: &'r ResolverConfig,
    cache: ExpressionCache,
    /// Packages declaring supplements/enhances, scanned in verification passes
    reverse_weak: Vec<PackageIdx>,
}

impl<'r, 'u> DependencyResolver<'r, 'u> {
    /// Prepare a resolver; every dependency string in the index is parsed once here
    pub fn new(index: &'r ProvidesIndex<'u>, config: &'r ResolverConfig) -> Self {
        let cache = ExpressionCache::build((0..index.len()).flat_map(|i| {
            let pkg = index.package(i);
            RELATION_KINDS
                .iter()
                .flat_map(move |kind| pkg.relations(*kind))
        }));

        let reverse_weak = (0..index.len())
            .filter(|&i| {
                let pkg = index.package(i);
                !pkg.supplements.is_empty() || !pkg.enhances.is_empty()
            })
            .collect();

        debug!("Parsed {} distinct dependency expressions", cache.len());

        Self {
            index,
            config,
            cache,
            reverse_weak,
        }
    }

    /// Close `seed` under the dependency relations
    pub fn close(&self, seed: &[PackageIdx]) -> Closure {
        let pool = self.thread_pool();
        let mut closure = vec![false; self.index.len()];
        let mut frontier = admit(seed.to_vec(), &mut closure);
        let mut waves = 0;

        let final_pass = loop {
            while !frontier.is_empty() {
                waves += 1;
                let expansion = self.run_wave(pool.as_ref(), &frontier, &closure);
                frontier = admit(expansion.additions, &mut closure);
                debug!("Wave {}: {} packages added", waves, frontier.len());
            }

            waves += 1;
            let members: Vec<PackageIdx> = members_of(&closure).collect();
            let mut expansion = self.run_wave(pool.as_ref(), &members, &closure);
            if self.config.weak_dependencies {
                expansion.additions.extend(self.reverse_weak_matches(&closure));
            }

            frontier = admit(expansion.additions, &mut closure);
            if frontier.is_empty() {
                break expansion.diagnostics;
            }
            debug!("Verification pass pulled in {} more packages", frontier.len());
        };

        let mut diagnostics = Diagnostics::new();
        diagnostics.extend(final_pass);
        diagnostics.extend(self.find_conflicts(&closure));

        let members: BTreeSet<PackageIdx> = members_of(&closure).collect();
        info!(
            "Closed {} seed packages into {} packages in {} waves",
            seed.len(),
            members.len(),
            waves
        );

        Closure {
            members,
            diagnostics,
            waves,
        }
    }

    fn thread_pool(&self) -> Option<rayon::ThreadPool> {
        if !self.config.parallel {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|i| format!("rpmcopy-resolve-{}", i))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Falling back to sequential resolution: {}", e);
                None
            }
        }
    }

    fn view<'a>(&'a self, closure: &'a [bool]) -> ClosureView<'a, 'u> {
        ClosureView {
            index: self.index,
            closure,
            skip_rpmlib: self.config.skip_rpmlib,
            ignore: None,
        }
    }

    fn run_wave(
        &self,
        pool: Option<&rayon::ThreadPool>,
        members: &[PackageIdx],
        closure: &[bool],
    ) -> Expansion {
        let view = self.view(closure);
        let expand = |idx: &PackageIdx| self.expand(*idx, &view);

        let parts: Vec<Expansion> = match pool {
            Some(pool) => pool.install(|| members.par_iter().map(expand).collect()),
            None => members.iter().map(expand).collect(),
        };

        let mut merged = Expansion::default();
        for part in parts {
            merged.absorb(part);
        }
        merged
    }

    /// Forward relations of one package that are not yet satisfied
    fn expand(&self, idx: PackageIdx, view: &ClosureView) -> Expansion {
        let pkg = self.index.package(idx);
        let mut out = Expansion::default();

        for &kind in self.forward_kinds() {
            for relation in pkg.relations(kind) {
                let expr = match self.cache.lookup(relation) {
                    Ok(expr) => expr,
                    Err(e) => {
                        out.diagnostics.push(syntax_diagnostic(pkg, kind, relation, e));
                        continue;
                    }
                };

                match self.plan(&expr, view) {
                    Ok(additions) => out.additions.extend(additions),
                    Err(missing) if !kind.is_weak() => {
                        out.diagnostics.push(Diagnostic::UnresolvedDependency {
                            package: pkg.to_string(),
                            relation: kind,
                            requirement: relation.to_string(),
                            missing,
                        });
                    }
                    Err(_) => {
                        debug!("Skipping unavailable {} '{}' of {}", kind, relation, pkg);
                    }
                }
            }
        }

        out
    }

    fn forward_kinds(&self) -> &'static [RelationKind] {
        if self.config.weak_dependencies {
            &[
                RelationKind::Requires,
                RelationKind::Recommends,
                RelationKind::Suggests,
            ]
        } else {
            &[RelationKind::Requires]
        }
    }

    /// Choose packages that make `expr` true, or say what is missing
    ///
    /// `or` prefers its left branch; each atom gets the single best-ranked
    /// provider; conditions are judged against the current closure.
    fn plan(&self, expr: &DepExpr, view: &ClosureView) -> Plan {
        if expr.evaluate(view) {
            return Ok(Vec::new());
        }

        match expr {
            DepExpr::Atom(cap) => self
                .index
                .best_candidate(cap)
                .map(|idx| vec![idx])
                .ok_or_else(|| vec![cap.to_string()]),
            DepExpr::Group(inner) => self.plan(inner, view),
            DepExpr::And(left, right) => match (self.plan(left, view), self.plan(right, view)) {
                (Ok(mut a), Ok(b)) => {
                    a.extend(b);
                    Ok(a)
                }
                (Err(mut a), Err(b)) => {
                    a.extend(b);
                    Err(a)
                }
                (Err(missing), Ok(_)) | (Ok(_), Err(missing)) => Err(missing),
            },
            DepExpr::Or(left, right) => match self.plan(left, view) {
                Ok(additions) => Ok(additions),
                Err(mut missing) => match self.plan(right, view) {
                    Ok(additions) => Ok(additions),
                    Err(more) => {
                        missing.extend(more);
                        Err(missing)
                    }
                },
            },
            DepExpr::If {
                then,
                condition,
                otherwise,
            } => self.plan_branch(condition.evaluate(view), then, otherwise.as_deref(), view),
            DepExpr::Unless {
                then,
                condition,
                otherwise,
            } => self.plan_branch(!condition.evaluate(view), then, otherwise.as_deref(), view),
            DepExpr::With(..) | DepExpr::Without(..) => {
                let candidates = expr.providers(&CandidateView {
                    index: self.index,
                    closure: view.closure,
                });
                self.index
                    .best_of(&candidates)
                    .map(|idx| vec![idx])
                    .ok_or_else(|| vec![expr.to_string()])
            }
        }
    }

    fn plan_branch(
        &self,
        take_then: bool,
        then: &DepExpr,
        otherwise: Option<&DepExpr>,
        view: &ClosureView,
    ) -> Plan {
        match (take_then, otherwise) {
            (true, _) => self.plan(then, view),
            (false, Some(otherwise)) => self.plan(otherwise, view),
            (false, None) => Ok(Vec::new()),
        }
    }

    /// Packages outside the closure that supplement or enhance something in it
    ///
    /// The expression must hold against the closure and at least one of its
    /// capabilities must actually come from a closure member, so a
    /// `supplements (a unless b)` does not fire on an empty closure.
    fn reverse_weak_matches(&self, closure: &[bool]) -> Vec<PackageIdx> {
        let view = self.view(closure);
        self.reverse_weak
            .iter()
            .copied()
            .filter(|&idx| !closure[idx] && self.index.is_eligible(idx))
            .filter(|&idx| {
                let pkg = self.index.package(idx);
                [RelationKind::Supplements, RelationKind::Enhances]
                    .iter()
                    .flat_map(|kind| pkg.relations(*kind))
                    .filter_map(|relation| self.cache.lookup(relation).ok())
                    .any(|expr| {
                        expr.evaluate(&view)
                            && expr.atoms().iter().any(|cap| view.provided_by_closure(cap))
                    })
            })
            .inspect(|&idx| {
                debug!(
                    "Pulling in {} as a reverse weak dependency",
                    self.index.package(idx)
                )
            })
            .collect()
    }

    /// Conflicts and obsoletes between closure members, reported only
    fn find_conflicts(&self, closure: &[bool]) -> Vec<Diagnostic> {
        let mut found = Vec::new();

        for idx in members_of(closure) {
            let pkg = self.index.package(idx);
            let view = ClosureView {
                ignore: Some(idx),
                ..self.view(closure)
            };

            for relation in &pkg.conflicts {
                let expr = match self.cache.lookup(relation) {
                    Ok(expr) => expr,
                    Err(e) => {
                        found.push(syntax_diagnostic(pkg, RelationKind::Conflicts, relation, e));
                        continue;
                    }
                };
                if !expr.evaluate(&view) {
                    continue;
                }
                for cap in expr.atoms() {
                    for other in Satisfier::providers(&view, cap) {
                        found.push(Diagnostic::ConflictDetected {
                            package: pkg.to_string(),
                            other: self.display_id(&other),
                            relation: RelationKind::Conflicts,
                            capability: cap.to_string(),
                        });
                    }
                }
            }

            // Obsoletes match package names, not provides
            for relation in &pkg.obsoletes {
                let expr = match self.cache.lookup(relation) {
                    Ok(expr) => expr,
                    Err(e) => {
                        found.push(syntax_diagnostic(pkg, RelationKind::Obsoletes, relation, e));
                        continue;
                    }
                };
                let mut target = &*expr;
                while let DepExpr::Group(inner) = target {
                    target = inner;
                }
                let DepExpr::Atom(cap) = target else {
                    found.push(Diagnostic::ExpressionSyntaxError {
                        package: pkg.to_string(),
                        relation: RelationKind::Obsoletes,
                        expression: relation.to_string(),
                        reason: "obsoletes must name a single package".to_string(),
                    });
                    continue;
                };
                for other in members_of(closure).filter(|&o| o != idx) {
                    let other = self.index.package(other);
                    if other.name() == cap.name && other.self_provide().satisfies(cap) {
                        found.push(Diagnostic::ConflictDetected {
                            package: pkg.to_string(),
                            other: other.to_string(),
                            relation: RelationKind::Obsoletes,
                            capability: cap.to_string(),
                        });
                    }
                }
            }
        }

        found
    }

    fn display_id(&self, id: &ContentId) -> String {
        self.index
            .index_of(id)
            .map(|idx| self.index.package(idx).to_string())
            .unwrap_or_else(|| id.to_string())
    }
}

/// Relation kinds whose strings are parsed up front
const RELATION_KINDS: [RelationKind; 7] = [
    RelationKind::Requires,
    RelationKind::Conflicts,
    RelationKind::Obsoletes,
    RelationKind::Recommends,
    RelationKind::Suggests,
    RelationKind::Enhances,
    RelationKind::Supplements,
];

/// Mark new packages as members, returning the ones that were not already in
fn admit(mut additions: Vec<PackageIdx>, closure: &mut [bool]) -> Vec<PackageIdx> {
    additions.sort_unstable();
    additions.dedup();
    additions.retain(|&idx| {
        let new = !closure[idx];
        closure[idx] = true;
        new
    });
    additions
}

fn members_of(closure: &[bool]) -> impl Iterator<Item = PackageIdx> + '_ {
    closure
        .iter()
        .enumerate()
        .filter(|(_, member)| **member)
        .map(|(idx, _)| idx)
}

fn syntax_diagnostic(
    pkg: &Package,
    kind: RelationKind,
    relation: &Relation,
    err: Error,
) -> Diagnostic {
    let reason = match err {
        Error::ExpressionSyntax { offset, reason, .. } => {
            format!("{} at offset {}", reason, offset)
        }
        other => other.to_string(),
    };
    Diagnostic::ExpressionSyntaxError {
        package: pkg.to_string(),
        relation: kind,
        expression: relation.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::Nevra;
    use crate::resolver::plan::ContentUniverse;

    fn pkg(id: &str, requires: &[&str]) -> Package {
        let mut p = Package::new(id, Nevra::new(id, "0", "1.0", "1", "noarch"));
        p.requires = requires.iter().map(|s| Relation::from(*s)).collect();
        p
    }

    fn sequential() -> ResolverConfig {
        ResolverConfig {
            parallel: false,
            ..ResolverConfig::default()
        }
    }

    fn close(
        universe: &ContentUniverse,
        config: &ResolverConfig,
        seed: &[&str],
    ) -> (Vec<String>, Diagnostics) {
        let index = ProvidesIndex::build(universe);
        let resolver = DependencyResolver::new(&index, config);
        let seed: Vec<PackageIdx> = seed
            .iter()
            .map(|id| index.index_of(&ContentId::from(*id)).unwrap())
            .collect();
        let closure = resolver.close(&seed);
        let names = closure
            .members
            .iter()
            .map(|&i| index.package(i).content_id.to_string())
            .collect();
        (names, closure.diagnostics)
    }

    #[test]
    fn test_transitive_requires() {
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["b"]))
            .with_package(pkg("b", &["c >= 1.0"]))
            .with_package(pkg("c", &[]))
            .with_package(pkg("d", &[]));
        let (members, diags) = close(&universe, &sequential(), &["a"]);
        assert_eq!(members, vec!["a", "b", "c"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["b"]))
            .with_package(pkg("b", &["a"]));
        let (members, _) = close(&universe, &sequential(), &["a"]);
        assert_eq!(members, vec!["a", "b"]);
    }

    #[test]
    fn test_unresolved_is_reported_not_fatal() {
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["missing >= 2", "b"]))
            .with_package(pkg("b", &[]));
        let (members, diags) = close(&universe, &sequential(), &["a"]);
        assert_eq!(members, vec!["a", "b"]);
        assert_eq!(diags.unresolved_count(), 1);
    }

    #[test]
    fn test_or_prefers_left_branch() {
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["(b or c)"]))
            .with_package(pkg("b", &[]))
            .with_package(pkg("c", &[]));
        let (members, _) = close(&universe, &sequential(), &["a"]);
        assert_eq!(members, vec!["a", "b"]);
    }

    #[test]
    fn test_or_falls_back_to_right_branch() {
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["(nothere or c)"]))
            .with_package(pkg("c", &[]));
        let (members, diags) = close(&universe, &sequential(), &["a"]);
        assert_eq!(members, vec!["a", "c"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_conditional_sees_later_additions() {
        // a pulls in b; a's "(c if b)" only triggers once b is present
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["(c if b)", "b"]))
            .with_package(pkg("b", &[]))
            .with_package(pkg("c", &[]));
        let (members, _) = close(&universe, &sequential(), &["a"]);
        assert_eq!(members, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unless_else() {
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["(b unless x else c)"]))
            .with_package(pkg("b", &[]))
            .with_package(pkg("c", &[]))
            .with_package(pkg("x", &[]));
        let (members, _) = close(&universe, &sequential(), &["a", "x"]);
        assert_eq!(members, vec!["a", "c", "x"]);
    }

    #[test]
    fn test_with_picks_single_provider() {
        let mut both = pkg("both", &[]);
        both.provides = vec![Relation::from("foo"), Relation::from("bar")];
        let mut only_foo = pkg("afoo", &[]);
        only_foo.provides = vec![Relation::from("foo")];
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["(foo with bar)"]))
            .with_package(both)
            .with_package(only_foo);
        let (members, diags) = close(&universe, &sequential(), &["a"]);
        assert_eq!(members, vec!["a", "both"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_syntax_error_skips_relation() {
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["(b and", "c"]))
            .with_package(pkg("b", &[]))
            .with_package(pkg("c", &[]));
        let (members, diags) = close(&universe, &sequential(), &["a"]);
        assert_eq!(members, vec!["a", "c"]);
        assert_eq!(diags.len(), 1);
        assert!(matches!(
            diags.iter().next(),
            Some(Diagnostic::ExpressionSyntaxError { .. })
        ));
    }

    #[test]
    fn test_malformed_conflicts_and_obsoletes_are_reported() {
        let mut a = pkg("a", &[]);
        a.conflicts = vec![Relation::from("(b and")];
        a.obsoletes = vec![Relation::from("(b or c)")];
        let universe = ContentUniverse::new().with_package(a);

        let (members, diags) = close(&universe, &sequential(), &["a"]);
        assert_eq!(members, vec!["a"]);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| matches!(d, Diagnostic::ExpressionSyntaxError { .. })));
        let kinds: Vec<RelationKind> = diags
            .iter()
            .filter_map(|d| match d {
                Diagnostic::ExpressionSyntaxError { relation, .. } => Some(*relation),
                _ => None,
            })
            .collect();
        assert!(kinds.contains(&RelationKind::Conflicts));
        assert!(kinds.contains(&RelationKind::Obsoletes));
    }

    #[test]
    fn test_rpmlib_requirements_skipped() {
        let universe = ContentUniverse::new()
            .with_package(pkg("a", &["rpmlib(PayloadIsZstd) <= 5.4.18-1"]));
        let (_, diags) = close(&universe, &sequential(), &["a"]);
        assert!(diags.is_empty());

        let strict = ResolverConfig {
            skip_rpmlib: false,
            ..sequential()
        };
        let (_, diags) = close(&universe, &strict, &["a"]);
        assert_eq!(diags.unresolved_count(), 1);
    }

    #[test]
    fn test_weak_dependencies() {
        let mut a = pkg("a", &[]);
        a.recommends = vec![Relation::from("b"), Relation::from("nowhere")];
        let mut langpack = pkg("langpack", &[]);
        langpack.supplements = vec![Relation::from("(a and lang-de)")];
        let mut plugin = pkg("plugin", &[]);
        plugin.enhances = vec![Relation::from("a")];
        let universe = ContentUniverse::new()
            .with_package(a)
            .with_package(pkg("b", &[]))
            .with_package(langpack)
            .with_package(plugin);

        let (members, _) = close(&universe, &sequential(), &["a"]);
        assert_eq!(members, vec!["a"]);

        let weak = ResolverConfig {
            weak_dependencies: true,
            ..sequential()
        };
        let (members, diags) = close(&universe, &weak, &["a"]);
        assert_eq!(members, vec!["a", "b", "plugin"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_conflicts_and_obsoletes_reported() {
        let mut a = pkg("a", &["b"]);
        a.conflicts = vec![Relation::from("b < 2.0")];
        let mut c = pkg("c", &[]);
        c.obsoletes = vec![Relation::from("a < 5")];
        let universe = ContentUniverse::new()
            .with_package(a)
            .with_package(pkg("b", &[]))
            .with_package(c);

        let (members, diags) = close(&universe, &sequential(), &["a", "c"]);
        assert_eq!(members, vec!["a", "b", "c"]);
        let conflicts: Vec<_> = diags
            .iter()
            .filter(|d| matches!(d, Diagnostic::ConflictDetected { .. }))
            .collect();
        assert_eq!(conflicts.len(), 2);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut universe = ContentUniverse::new();
        for i in 0..50 {
            let next = format!("p{:02}", (i * 7 + 3) % 50);
            universe.add_package(pkg(&format!("p{:02}", i), &[&next, "(q or r)"]));
        }
        universe.add_package(pkg("q", &[]));
        universe.add_package(pkg("r", &[]));

        let parallel = ResolverConfig {
            threads: 4,
            ..ResolverConfig::default()
        };
        let seq = close(&universe, &sequential(), &["p00"]);
        let par = close(&universe, &parallel, &["p00"]);
        assert_eq!(seq.0, par.0);
        assert_eq!(seq.1, par.1);
    }
}
