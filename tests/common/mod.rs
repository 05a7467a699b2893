// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use rpmcopy::advisory::{AdvisoryCollection, AdvisoryPackage};
use rpmcopy::packages::Relation;
use rpmcopy::{Advisory, ContentId, Nevra, Package};
use std::collections::BTreeSet;

/// A noarch package whose content id is its name
pub fn package(name: &str, version: &str, requires: &[&str]) -> Package {
    let mut pkg = Package::new(
        format!("{}-{}", name, version),
        Nevra::new(name, "0", version, "1", "noarch"),
    );
    pkg.requires = relations(requires);
    pkg
}

/// Same as [`package`] with an explicit content id
pub fn package_with_id(id: &str, name: &str, version: &str, requires: &[&str]) -> Package {
    let mut pkg = package(name, version, requires);
    pkg.content_id = ContentId::from(id);
    pkg
}

pub fn relations(items: &[&str]) -> Vec<Relation> {
    items.iter().map(|s| Relation::from(*s)).collect()
}

pub fn ids(items: &[&str]) -> BTreeSet<ContentId> {
    items.iter().map(|s| ContentId::from(*s)).collect()
}

/// An advisory listing the given packages (name, version) in one collection
pub fn advisory(
    content_id: &str,
    id: &str,
    version: &str,
    date: Option<&str>,
    packages: &[(&str, &str)],
) -> Advisory {
    let mut advisory = Advisory::new(content_id, id, version);
    advisory.updated_date = date.map(str::to_string);
    advisory.collections.push(AdvisoryCollection {
        name: "collection-0".to_string(),
        short_name: None,
        module: None,
        packages: packages
            .iter()
            .map(|(name, version)| AdvisoryPackage {
                name: name.to_string(),
                epoch: "0".to_string(),
                version: version.to_string(),
                release: "1".to_string(),
                arch: "noarch".to_string(),
                filename: Some(format!("{}-{}-1.noarch.rpm", name, version)),
            })
            .collect(),
    });
    advisory
}
