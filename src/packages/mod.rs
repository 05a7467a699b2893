// src/packages/mod.rs

//! Package metadata as seen by the copy resolver
//!
//! Packages are immutable once loaded: the resolver only ever reads them.
//! Identity is the NEVRA tuple; `content_id` is the storage key the
//! repository layer uses to reference the unit.

pub mod capability;
pub mod module;

pub use capability::{Capability, Operator, Relation};
pub use module::ModuleUnit;

use crate::version::RpmVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumString};

/// Opaque storage key of a content unit (package, module or advisory)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Name-epoch-version-release-arch identity of a package
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nevra {
    pub name: String,
    #[serde(default = "default_epoch")]
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

fn default_epoch() -> String {
    "0".to_string()
}

impl Nevra {
    pub fn new(
        name: impl Into<String>,
        epoch: impl Into<String>,
        version: impl Into<String>,
        release: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            epoch: epoch.into(),
            version: version.into(),
            release: release.into(),
            arch: arch.into(),
        }
    }

    /// The epoch:version-release of this package
    pub fn evr(&self) -> RpmVersion {
        RpmVersion::new(
            Some(self.epoch.as_str()),
            self.version.as_str(),
            Some(self.release.as_str()),
        )
    }
}

impl fmt::Display for Nevra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.name, self.evr(), self.arch)
    }
}

/// The dependency relations a package can declare
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RelationKind {
    Provides,
    Requires,
    Conflicts,
    Obsoletes,
    Recommends,
    Suggests,
    Enhances,
    Supplements,
}

impl RelationKind {
    /// Weak relations never block resolution
    pub fn is_weak(self) -> bool {
        matches!(
            self,
            RelationKind::Recommends
                | RelationKind::Suggests
                | RelationKind::Enhances
                | RelationKind::Supplements
        )
    }

    /// Reverse weak relations are declared by the package that gets pulled in
    pub fn is_reverse(self) -> bool {
        matches!(self, RelationKind::Enhances | RelationKind::Supplements)
    }
}

/// An RPM package and its dependency metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub content_id: ContentId,
    #[serde(flatten)]
    pub nevra: Nevra,
    #[serde(default)]
    pub provides: Vec<Relation>,
    #[serde(default)]
    pub requires: Vec<Relation>,
    #[serde(default)]
    pub conflicts: Vec<Relation>,
    #[serde(default)]
    pub obsoletes: Vec<Relation>,
    #[serde(default)]
    pub recommends: Vec<Relation>,
    #[serde(default)]
    pub suggests: Vec<Relation>,
    #[serde(default)]
    pub enhances: Vec<Relation>,
    #[serde(default)]
    pub supplements: Vec<Relation>,
    /// Paths owned by the package, used to satisfy file requirements
    #[serde(default)]
    pub files: Vec<String>,
}

impl Package {
    /// A package with no relations
    pub fn new(content_id: impl Into<String>, nevra: Nevra) -> Self {
        Self {
            content_id: ContentId::new(content_id),
            nevra,
            provides: Vec::new(),
            requires: Vec::new(),
            conflicts: Vec::new(),
            obsoletes: Vec::new(),
            recommends: Vec::new(),
            suggests: Vec::new(),
            enhances: Vec::new(),
            supplements: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.nevra.name
    }

    pub fn relations(&self, kind: RelationKind) -> &[Relation] {
        match kind {
            RelationKind::Provides => &self.provides,
            RelationKind::Requires => &self.requires,
            RelationKind::Conflicts => &self.conflicts,
            RelationKind::Obsoletes => &self.obsoletes,
            RelationKind::Recommends => &self.recommends,
            RelationKind::Suggests => &self.suggests,
            RelationKind::Enhances => &self.enhances,
            RelationKind::Supplements => &self.supplements,
        }
    }

    /// The implicit `name = epoch:version-release` provide every package carries
    pub fn self_provide(&self) -> Capability {
        Capability::versioned(self.nevra.name.clone(), Operator::EQ, &self.nevra.evr())
    }

    /// All capabilities this package provides, the implicit one first
    ///
    /// Rich expressions are not valid in provides and are skipped.
    pub fn provided_capabilities(&self) -> Vec<Capability> {
        let mut caps = vec![self.self_provide()];
        caps.extend(self.provides.iter().filter_map(Relation::as_capability));
        caps
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nevra)
    }
}
