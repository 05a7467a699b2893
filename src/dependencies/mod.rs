// src/dependencies/mod.rs

//! Dependency strings and their parsed form
//!
//! Relations arrive either as capability tuples or as strings. Strings are
//! parsed once per resolution run into [`DepExpr`] trees and kept in an
//! [`ExpressionCache`] that worker threads share read-only.
//!
//! # Example
//!
//! ```
//! use rpmcopy::dependencies::DepExpr;
//!
//! let expr = DepExpr::parse("(a and b) or c").unwrap();
//! let sat = |cap: &rpmcopy::packages::Capability| cap.name != "b";
//! assert!(expr.evaluate(&sat));
//! ```

mod rich;

pub use rich::{DepExpr, Satisfier};

use crate::error::{Error, Result};
use crate::packages::Relation;
use rayon::prelude::*;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// Requirements on rpm's own features, satisfied by the package manager
pub fn is_rpmlib(name: &str) -> bool {
    name.starts_with("rpmlib(")
}

/// File requirements are satisfied by file ownership, not provides
pub fn is_file_dependency(name: &str) -> bool {
    name.starts_with('/')
}

#[derive(Debug, Clone)]
struct SyntaxFailure {
    offset: usize,
    reason: String,
}

/// Parsed dependency strings, keyed by their source text
#[derive(Debug, Default)]
pub struct ExpressionCache {
    parsed: HashMap<String, std::result::Result<DepExpr, SyntaxFailure>>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every distinct dependency string among `relations`
    pub fn build<'a>(relations: impl IntoIterator<Item = &'a Relation>) -> Self {
        let distinct: HashSet<&str> = relations
            .into_iter()
            .filter_map(|r| match r {
                Relation::Expression(s) => Some(s.as_str()),
                Relation::Simple(_) => None,
            })
            .collect();

        let parsed = distinct
            .into_par_iter()
            .map(|s| {
                let parsed = DepExpr::parse(s).map_err(|e| match e {
                    Error::ExpressionSyntax { offset, reason, .. } => {
                        SyntaxFailure { offset, reason }
                    }
                    other => SyntaxFailure {
                        offset: 0,
                        reason: other.to_string(),
                    },
                });
                (s.to_string(), parsed)
            })
            .collect();

        Self { parsed }
    }

    pub fn len(&self) -> usize {
        self.parsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsed.is_empty()
    }

    /// The expression tree for a relation
    ///
    /// Strings missing from the cache are parsed on the spot.
    pub fn lookup(&self, relation: &Relation) -> Result<Cow<'_, DepExpr>> {
        match relation {
            Relation::Simple(cap) => Ok(Cow::Owned(DepExpr::Atom(cap.clone()))),
            Relation::Expression(s) => match self.parsed.get(s) {
                Some(Ok(expr)) => Ok(Cow::Borrowed(expr)),
                Some(Err(failure)) => Err(Error::ExpressionSyntax {
                    expression: s.clone(),
                    offset: failure.offset,
                    reason: failure.reason.clone(),
                }),
                None => DepExpr::parse(s).map(Cow::Owned),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::Capability;

    #[test]
    fn test_cache_parses_distinct_strings_once() {
        let relations = vec![
            Relation::from("(a or b)"),
            Relation::from("(a or b)"),
            Relation::from("(c and"),
            Relation::Simple(Capability::named("d")),
        ];
        let cache = ExpressionCache::build(&relations);
        assert_eq!(cache.len(), 2);

        assert!(matches!(*cache.lookup(&relations[0]).unwrap(), DepExpr::Group(_)));
        assert!(cache.lookup(&relations[2]).is_err());
        assert!(matches!(*cache.lookup(&relations[3]).unwrap(), DepExpr::Atom(_)));
    }

    #[test]
    fn test_lookup_parses_uncached_strings() {
        let cache = ExpressionCache::new();
        let expr = cache.lookup(&Relation::from("foo >= 1.0")).unwrap();
        assert!(matches!(*expr, DepExpr::Atom(_)));
    }

    #[test]
    fn test_special_names() {
        assert!(is_rpmlib("rpmlib(CompressedFileNames)"));
        assert!(is_file_dependency("/bin/sh"));
        assert!(!is_file_dependency("bash"));
    }
}
