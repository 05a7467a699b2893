// src/advisory/mod.rs

//! Advisory (updateinfo) records and their reconciliation
//!
//! An advisory copied into a repository that already carries a record with
//! the same id is either added, replaces the existing record, is merged
//! into it, or is dropped in favour of the destination:
//!
//! | source vs destination                 | result                        |
//! |---------------------------------------|-------------------------------|
//! | no destination record                 | added                         |
//! | higher version                        | replaced wholesale            |
//! | lower version                         | destination kept              |
//! | same version, same date               | package lists merged          |
//! | same version, a date missing          | package lists merged          |
//! | same version, different dates         | destination kept, diagnostic  |
//!
//! Versions compare as integers. Dates compare as timestamps when both
//! parse, otherwise as text.

use crate::packages::{ContentId, Nevra};
use crate::resolver::{Diagnostic, Diagnostics};
use crate::version::compare_numeric;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

/// A package listed by an advisory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryPackage {
    pub name: String,
    #[serde(default = "default_epoch")]
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

fn default_epoch() -> String {
    "0".to_string()
}

impl AdvisoryPackage {
    pub fn nevra(&self) -> Nevra {
        Nevra::new(
            self.name.clone(),
            self.epoch.clone(),
            self.version.clone(),
            self.release.clone(),
            self.arch.clone(),
        )
    }
}

/// A named package list, optionally scoped to a module stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryCollection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    /// `name:stream` of the module the collection belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default)]
    pub packages: Vec<AdvisoryPackage>,
}

impl AdvisoryCollection {
    fn key(&self) -> (&str, Option<&str>) {
        (&self.name, self.module.as_deref())
    }
}

/// An update record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub content_id: ContentId,
    /// Advisory id, e.g. `FEDORA-2024-1a2b3c`
    pub id: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<String>,
    #[serde(default)]
    pub collections: Vec<AdvisoryCollection>,
}

fn default_version() -> String {
    "1".to_string()
}

impl Advisory {
    pub fn new(
        content_id: impl Into<String>,
        id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            content_id: ContentId::new(content_id),
            id: id.into(),
            version: version.into(),
            issued_date: None,
            updated_date: None,
            collections: Vec::new(),
        }
    }

    /// Compare versions as integers; anything non-numeric counts as 0
    pub fn compare_version(&self, other: &Advisory) -> Ordering {
        compare_numeric(self.version.trim(), other.version.trim())
    }

    /// Update date, falling back to the issue date
    pub fn effective_date(&self) -> Option<&str> {
        self.updated_date
            .as_deref()
            .or(self.issued_date.as_deref())
            .filter(|d| !d.trim().is_empty())
    }

    /// Every package identity in the record
    pub fn package_nevras(&self) -> BTreeSet<Nevra> {
        self.collections
            .iter()
            .flat_map(|c| c.packages.iter())
            .map(AdvisoryPackage::nevra)
            .collect()
    }

    /// This record with `other`'s packages added
    ///
    /// Collections are matched by name and module; packages already listed
    /// anywhere in the record are not repeated. The result gets a content id
    /// derived from its contents.
    pub fn merged_with(&self, other: &Advisory) -> Advisory {
        let mut merged = self.clone();
        let mut seen = self.package_nevras();

        for collection in &other.collections {
            let fresh: Vec<AdvisoryPackage> = collection
                .packages
                .iter()
                .filter(|p| seen.insert(p.nevra()))
                .cloned()
                .collect();
            if fresh.is_empty() {
                continue;
            }

            match merged
                .collections
                .iter_mut()
                .find(|c| c.key() == collection.key())
            {
                Some(existing) => existing.packages.extend(fresh),
                None => merged.collections.push(AdvisoryCollection {
                    packages: fresh,
                    ..collection.clone()
                }),
            }
        }

        merged.content_id = ContentId::new(merged.digest());
        merged
    }

    /// SHA-256 over the record's identity and package list
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.id.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.version.as_bytes());
        for collection in &self.collections {
            hasher.update(b"\0");
            hasher.update(collection.name.as_bytes());
            hasher.update(b"\0");
            hasher.update(collection.module.as_deref().unwrap_or("").as_bytes());
            let mut nevras: Vec<String> = collection
                .packages
                .iter()
                .map(|p| p.nevra().to_string())
                .collect();
            nevras.sort();
            for nevra in nevras {
                hasher.update(b"\0");
                hasher.update(nevra.as_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (version {})", self.id, self.version)
    }
}

/// What happened to one source advisory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The destination had no record with this id
    Added { advisory: Advisory },
    /// The source record is newer and takes over
    Replaced { previous: ContentId, advisory: Advisory },
    /// Package lists were combined into a new record
    Merged { previous: ContentId, advisory: Advisory },
    /// Merging would not change the destination record
    Unchanged { advisory: ContentId },
    /// The destination record is newer
    KeptDestination { advisory: ContentId },
    /// Ambiguous dates; destination kept and a diagnostic recorded
    Conflict { advisory: ContentId },
}

impl ReconcileOutcome {
    /// The record that ends up in the new repository version, if it changes
    pub fn incoming(&self) -> Option<&Advisory> {
        match self {
            ReconcileOutcome::Added { advisory }
            | ReconcileOutcome::Replaced { advisory, .. }
            | ReconcileOutcome::Merged { advisory, .. } => Some(advisory),
            _ => None,
        }
    }

    /// The destination record that has to go
    pub fn outgoing(&self) -> Option<&ContentId> {
        match self {
            ReconcileOutcome::Replaced { previous, .. }
            | ReconcileOutcome::Merged { previous, .. } => {
                Some(previous)
            }
            _ => None,
        }
    }
}

/// Reconciles source advisories against the destination's records
pub struct AdvisoryReconciler;

impl AdvisoryReconciler {
    pub fn reconcile(
        source: &Advisory,
        destination: Option<&Advisory>,
        diagnostics: &mut Diagnostics,
    ) -> ReconcileOutcome {
        let Some(existing) = destination else {
            debug!("Adding advisory {}", source);
            return ReconcileOutcome::Added {
                advisory: source.clone(),
            };
        };

        if existing.content_id == source.content_id {
            return ReconcileOutcome::Unchanged {
                advisory: existing.content_id.clone(),
            };
        }

        let outcome = match source.compare_version(existing) {
            Ordering::Greater => ReconcileOutcome::Replaced {
                previous: existing.content_id.clone(),
                advisory: source.clone(),
            },
            Ordering::Less => ReconcileOutcome::KeptDestination {
                advisory: existing.content_id.clone(),
            },
            Ordering::Equal => match (source.effective_date(), existing.effective_date()) {
                (Some(ours), Some(theirs)) if !dates_equal(ours, theirs) => {
                    diagnostics.push(Diagnostic::AdvisoryConflict {
                        advisory_id: source.id.clone(),
                        version: source.version.clone(),
                        source_date: ours.to_string(),
                        destination_date: theirs.to_string(),
                    });
                    ReconcileOutcome::Conflict {
                        advisory: existing.content_id.clone(),
                    }
                }
                _ => merge(existing, source),
            },
        };

        info!("Advisory {}: {:?}", source, OutcomeKind(&outcome));
        outcome
    }
}

fn merge(existing: &Advisory, source: &Advisory) -> ReconcileOutcome {
    let merged = existing.merged_with(source);
    if merged.package_nevras() == existing.package_nevras() {
        ReconcileOutcome::Unchanged {
            advisory: existing.content_id.clone(),
        }
    } else {
        ReconcileOutcome::Merged {
            previous: existing.content_id.clone(),
            advisory: merged,
        }
    }
}

/// Short form of an outcome for log lines
struct OutcomeKind<'a>(&'a ReconcileOutcome);

impl fmt::Debug for OutcomeKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.0 {
            ReconcileOutcome::Added { .. } => "added",
            ReconcileOutcome::Replaced { .. } => "replaced",
            ReconcileOutcome::Merged { .. } => "merged",
            ReconcileOutcome::Unchanged { .. } => "unchanged",
            ReconcileOutcome::KeptDestination { .. } => "destination kept",
            ReconcileOutcome::Conflict { .. } => "conflict",
        })
    }
}

fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S UTC", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    // updateinfo.xml sometimes carries unix timestamps
    s.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.naive_utc())
}

fn dates_equal(a: &str, b: &str) -> bool {
    match (parse_date(a), parse_date(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a.trim() == b.trim(),
    }
}
