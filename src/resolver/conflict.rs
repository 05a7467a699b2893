// src/resolver/conflict.rs

//! Diagnostics collected while resolving a copy
//!
//! Nothing here aborts a resolution. Every problem becomes a [`Diagnostic`]
//! in the [`Diagnostics`] collector that is handed back with the result.

use crate::packages::RelationKind;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// A non-fatal problem found during resolution or reconciliation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A dependency string could not be parsed; the relation was skipped
    ExpressionSyntaxError {
        package: String,
        relation: RelationKind,
        expression: String,
        reason: String,
    },
    /// No provider exists for a hard requirement
    UnresolvedDependency {
        package: String,
        relation: RelationKind,
        requirement: String,
        missing: Vec<String>,
    },
    /// Two packages in the closure conflict with or obsolete each other
    ConflictDetected {
        package: String,
        other: String,
        relation: RelationKind,
        capability: String,
    },
    /// Same advisory id and version with differing dates; destination kept
    AdvisoryConflict {
        advisory_id: String,
        version: String,
        source_date: String,
        destination_date: String,
    },
}

impl Diagnostic {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Diagnostic::UnresolvedDependency { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ExpressionSyntaxError {
                package,
                relation,
                expression,
                reason,
            } => write!(
                f,
                "Skipping malformed {} '{}' of {}: {}",
                relation, expression, package, reason
            ),
            Diagnostic::UnresolvedDependency {
                package,
                relation,
                requirement,
                missing,
            } => {
                write!(f, "Unresolved {} '{}' of {}", relation, requirement, package)?;
                if !missing.is_empty() {
                    write!(f, " (no provider for {})", missing.join(", "))?;
                }
                Ok(())
            }
            Diagnostic::ConflictDetected {
                package,
                other,
                relation,
                capability,
            } => write!(
                f,
                "Package {} {} '{}' provided by {}",
                package, relation, capability, other
            ),
            Diagnostic::AdvisoryConflict {
                advisory_id,
                version,
                source_date,
                destination_date,
            } => write!(
                f,
                "Advisory {} version {} differs in date ({} vs {}), destination kept",
                advisory_id, version, source_date, destination_date
            ),
        }
    }
}

/// Collector for diagnostics, de-duplicated and kept in a stable order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: BTreeSet<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic; repeated diagnostics are kept once
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if !self.entries.contains(&diagnostic) {
            warn!("{}", diagnostic);
            self.entries.insert(diagnostic);
        }
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for d in diagnostics {
            self.push(d);
        }
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unresolved_count(&self) -> usize {
        self.entries.iter().filter(|d| d.is_unresolved()).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries.into_iter().collect()
    }
}
