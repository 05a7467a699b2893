// src/packages/capability.rs

//! Capabilities and the relations packages declare over them
//!
//! A capability is a name with an optional version range, e.g. `libc.so.6`,
//! `perl(Cwd)` or `openssl-libs >= 1:3.0.7`. Relations are either such a
//! simple capability or a rich boolean expression string.

use crate::version::RpmVersion;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use strum_macros::{Display, EnumString};

/// Comparison operator of a versioned capability
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Operator {
    EQ,
    LT,
    LE,
    GT,
    GE,
}

impl Operator {
    /// Parse the symbolic spelling used inside dependency strings
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "=" | "==" => Some(Operator::EQ),
            "<" => Some(Operator::LT),
            "<=" | "=<" => Some(Operator::LE),
            ">" => Some(Operator::GT),
            ">=" | "=>" => Some(Operator::GE),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> &'static str {
        match self {
            Operator::EQ => "=",
            Operator::LT => "<",
            Operator::LE => "<=",
            Operator::GT => ">",
            Operator::GE => ">=",
        }
    }

    fn has_less(self) -> bool {
        matches!(self, Operator::LT | Operator::LE)
    }

    fn has_greater(self) -> bool {
        matches!(self, Operator::GT | Operator::GE)
    }

    fn has_equal(self) -> bool {
        matches!(self, Operator::EQ | Operator::LE | Operator::GE)
    }

    /// Check whether `version` lies in the range `self reference`
    pub fn accepts(self, version: &RpmVersion, reference: &RpmVersion) -> bool {
        let sense = version.compare_for_match(reference);
        match self {
            Operator::EQ => sense == Ordering::Equal,
            Operator::LT => sense == Ordering::Less,
            Operator::LE => sense != Ordering::Greater,
            Operator::GT => sense == Ordering::Greater,
            Operator::GE => sense != Ordering::Less,
        }
    }
}

/// A named, optionally versioned capability
///
/// `flags` is only meaningful when a version is present; constructors drop
/// the operator otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    #[serde(default)]
    pub flags: Option<Operator>,
    #[serde(default)]
    pub epoch: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub pre: bool,
}

impl Capability {
    /// An unversioned capability
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: None,
            epoch: None,
            version: None,
            release: None,
            pre: false,
        }
    }

    /// A capability constrained to `op evr`
    pub fn versioned(name: impl Into<String>, op: Operator, evr: &RpmVersion) -> Self {
        Self {
            name: name.into(),
            flags: Some(op),
            epoch: Some(evr.epoch.clone()),
            version: Some(evr.version.clone()),
            release: evr.release.clone(),
            pre: false,
        }
    }

    /// Parse `name` or `name op [epoch:]version[-release]`
    ///
    /// Returns None when an operator is present without a version or the
    /// operator is not recognised.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split_whitespace();
        let name = parts.next()?;
        match (parts.next(), parts.next(), parts.next()) {
            (None, _, _) => Some(Self::named(name)),
            (Some(op), Some(evr), None) => {
                let op = Operator::from_symbol(op)?;
                let evr = RpmVersion::parse(evr).ok()?;
                Some(Self::versioned(name, op, &evr))
            }
            _ => None,
        }
    }

    /// The version range of this capability, if it has one
    pub fn range(&self) -> Option<(Operator, RpmVersion)> {
        let version = self.version.as_deref().filter(|v| !v.is_empty())?;
        let op = self.flags?;
        Some((
            op,
            RpmVersion::new(self.epoch.as_deref(), version, self.release.as_deref()),
        ))
    }

    /// Check whether this provided capability satisfies `required`
    ///
    /// Names must match exactly. An unversioned provide or requirement
    /// matches any version; otherwise the two ranges must overlap.
    pub fn satisfies(&self, required: &Capability) -> bool {
        if self.name != required.name {
            return false;
        }
        let Some((req_op, req_evr)) = required.range() else {
            return true;
        };
        let Some((prov_op, prov_evr)) = self.range() else {
            return true;
        };

        match prov_evr.compare_for_match(&req_evr) {
            Ordering::Less => prov_op.has_greater() || req_op.has_less(),
            Ordering::Greater => prov_op.has_less() || req_op.has_greater(),
            Ordering::Equal => {
                (prov_op.has_equal() && req_op.has_equal())
                    || (prov_op.has_less() && req_op.has_less())
                    || (prov_op.has_greater() && req_op.has_greater())
            }
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some((op, evr)) = self.range() {
            write!(f, " {} {}", op.as_symbol(), evr)?;
        }
        Ok(())
    }
}

/// One entry of a package's provides/requires/... list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Relation {
    /// A plain capability tuple
    Simple(Capability),
    /// A dependency string; rich expressions are wrapped in parentheses
    Expression(String),
}

impl Relation {
    /// The relation as a capability, when it is not a rich expression
    pub fn as_capability(&self) -> Option<Capability> {
        match self {
            Relation::Simple(cap) => Some(cap.clone()),
            Relation::Expression(s) if !s.trim_start().starts_with('(') => Capability::parse(s),
            Relation::Expression(_) => None,
        }
    }

    pub fn is_rich(&self) -> bool {
        matches!(self, Relation::Expression(s) if s.trim_start().starts_with('('))
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Simple(cap) => write!(f, "{}", cap),
            Relation::Expression(s) => write!(f, "{}", s),
        }
    }
}

impl From<Capability> for Relation {
    fn from(cap: Capability) -> Self {
        Relation::Simple(cap)
    }
}

impl From<&str> for Relation {
    fn from(s: &str) -> Self {
        Relation::Expression(s.to_string())
    }
}
