// src/resolver/index.rs

//! Capability → provider lookup
//!
//! The index is built once per resolution run from the candidate universe
//! and is read-only afterwards, so worker threads can share it freely.
//! Packages live in an arena and are referred to by position; the resolver
//! keeps its closure as a bitmap over the same positions.

use super::plan::ContentUniverse;
use crate::dependencies::is_file_dependency;
use crate::packages::{Capability, ContentId, Package};
use crate::version::RpmVersion;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Position of a package in the index arena
pub type PackageIdx = usize;

/// A package that can satisfy a requirement, with the version it provides
#[derive(Debug, Clone)]
pub struct Candidate {
    pub package: PackageIdx,
    /// Version of the matching provide (None for unversioned provides)
    pub provided: Option<RpmVersion>,
}

/// Read-only map from capability names to providing packages
#[derive(Debug)]
pub struct ProvidesIndex<'u> {
    packages: Vec<&'u Package>,
    by_id: HashMap<&'u ContentId, PackageIdx>,
    provides: HashMap<String, Vec<(PackageIdx, Capability)>>,
    files: HashMap<&'u str, Vec<PackageIdx>>,
    in_destination: Vec<bool>,
    eligible: Vec<bool>,
}

impl<'u> ProvidesIndex<'u> {
    /// Index every package of the universe
    pub fn build(universe: &'u ContentUniverse) -> Self {
        let packages: Vec<&Package> = universe.packages().collect();
        let mut by_id = HashMap::with_capacity(packages.len());
        let mut provides: HashMap<String, Vec<(PackageIdx, Capability)>> = HashMap::new();
        let mut files: HashMap<&str, Vec<PackageIdx>> = HashMap::new();
        let mut in_destination = Vec::with_capacity(packages.len());

        for (idx, pkg) in packages.iter().enumerate() {
            by_id.insert(&pkg.content_id, idx);
            in_destination.push(universe.in_destination(&pkg.content_id));

            for cap in pkg.provided_capabilities() {
                provides.entry(cap.name.clone()).or_default().push((idx, cap));
            }
            for path in &pkg.files {
                files.entry(path.as_str()).or_default().push(idx);
            }
        }

        debug!(
            "Built provides index: {} packages, {} capabilities, {} files",
            packages.len(),
            provides.len(),
            files.len()
        );

        let eligible = vec![true; packages.len()];
        Self {
            packages,
            by_id,
            provides,
            files,
            in_destination,
            eligible,
        }
    }

    /// Never offer the given packages as candidates
    ///
    /// Excluded packages still count as providers once they are part of a
    /// closure; they are only skipped when choosing something new.
    pub fn exclude(mut self, excluded: &BTreeSet<ContentId>) -> Self {
        for id in excluded {
            if let Some(&idx) = self.by_id.get(id) {
                self.eligible[idx] = false;
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn package(&self, idx: PackageIdx) -> &'u Package {
        self.packages[idx]
    }

    pub fn index_of(&self, id: &ContentId) -> Option<PackageIdx> {
        self.by_id.get(id).copied()
    }

    pub fn in_destination(&self, idx: PackageIdx) -> bool {
        self.in_destination[idx]
    }

    pub fn is_eligible(&self, idx: PackageIdx) -> bool {
        self.eligible[idx]
    }

    /// All packages providing `required`, eligible or not
    ///
    /// File requirements are matched against file lists as well as
    /// explicit provides.
    pub fn providers(&self, required: &Capability) -> Vec<Candidate> {
        let mut best: HashMap<PackageIdx, Option<RpmVersion>> = HashMap::new();

        if let Some(entries) = self.provides.get(&required.name) {
            for (idx, cap) in entries {
                if !cap.satisfies(required) {
                    continue;
                }
                let provided = cap.range().map(|(_, evr)| evr);
                best.entry(*idx)
                    .and_modify(|current| {
                        if provided_cmp(&provided, current) == Ordering::Greater {
                            *current = provided.clone();
                        }
                    })
                    .or_insert(provided);
            }
        }

        if is_file_dependency(&required.name) {
            if let Some(owners) = self.files.get(required.name.as_str()) {
                for &idx in owners {
                    best.entry(idx).or_insert(None);
                }
            }
        }

        best.into_iter()
            .map(|(package, provided)| Candidate { package, provided })
            .collect()
    }

    /// Eligible providers of `required`, best first
    ///
    /// Ranking: already in the destination, then highest provided version,
    /// then package name. Remaining ties go to the newer package, then
    /// architecture and content id so the order is total.
    pub fn candidates(&self, required: &Capability) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = self
            .providers(required)
            .into_iter()
            .filter(|c| self.eligible[c.package])
            .collect();
        candidates.sort_by(|a, b| self.rank(a, b));
        candidates
    }

    /// The single provider selected for `required`, if any
    pub fn best_candidate(&self, required: &Capability) -> Option<PackageIdx> {
        self.candidates(required).first().map(|c| c.package)
    }

    /// Pick the best of a set of packages without reference to a capability
    pub fn best_of(&self, ids: &BTreeSet<ContentId>) -> Option<PackageIdx> {
        let mut candidates: Vec<Candidate> = ids
            .iter()
            .filter_map(|id| self.index_of(id))
            .filter(|&idx| self.eligible[idx])
            .map(|package| Candidate {
                package,
                provided: None,
            })
            .collect();
        candidates.sort_by(|a, b| self.rank(a, b));
        candidates.first().map(|c| c.package)
    }

    /// Packages with the given name, best first
    pub fn by_name(&self, name: &str) -> Vec<PackageIdx> {
        let mut candidates: Vec<Candidate> = self
            .provides
            .get(name)
            .into_iter()
            .flatten()
            .filter(|(idx, _)| self.packages[*idx].name() == name && self.eligible[*idx])
            .map(|(idx, _)| Candidate {
                package: *idx,
                provided: None,
            })
            .collect();
        candidates.sort_by(|a, b| self.rank(a, b));
        candidates.dedup_by_key(|c| c.package);
        candidates.into_iter().map(|c| c.package).collect()
    }

    fn rank(&self, a: &Candidate, b: &Candidate) -> Ordering {
        let pa = self.packages[a.package];
        let pb = self.packages[b.package];

        self.in_destination[b.package]
            .cmp(&self.in_destination[a.package])
            .then_with(|| provided_cmp(&b.provided, &a.provided))
            .then_with(|| pa.name().cmp(pb.name()))
            .then_with(|| pb.nevra.evr().cmp(&pa.nevra.evr()))
            .then_with(|| pa.nevra.arch.cmp(&pb.nevra.arch))
            .then_with(|| pa.content_id.cmp(&pb.content_id))
    }
}

/// Versioned provides rank above unversioned ones
fn provided_cmp(a: &Option<RpmVersion>, b: &Option<RpmVersion>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
