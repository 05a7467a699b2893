// tests/copy_workflow.rs

//! End-to-end copy tests against the in-memory store.
//!
//! These tests verify that:
//! 1. Copies publish exactly one new version per destination
//! 2. Advisories are added, replaced, merged or kept as configured
//! 3. Module selections bring their packages along
//! 4. Strict mode refuses to commit unresolved copies
//! 5. Stores and requests round-trip through files

mod common;

use common::{advisory, ids, package, package_with_id};
use rpmcopy::advisory::ReconcileOutcome;
use rpmcopy::config::Config;
use rpmcopy::repository::{CopyMapping, VersionRef};
use rpmcopy::{
    ContentId, ContentStore, CopyRequest, Diagnostic, Error, InMemoryStore, ModuleUnit, copy,
};

fn mapping(source: VersionRef, dest: &str, content: Option<&[&str]>) -> CopyMapping {
    CopyMapping {
        source_repo_version: source,
        dest_repo: dest.to_string(),
        dest_base_version: None,
        content: content.map(|c| c.iter().map(|id| ContentId::from(*id)).collect()),
    }
}

/// A source repo with an updated openssl and its advisory, and a stable
/// destination carrying the previous release of the advisory.
fn setup() -> (InMemoryStore, VersionRef) {
    let store = InMemoryStore::new();
    store.add_package(package("openssl", "3.0.1", &["openssl-libs = 3.0.1"]));
    store.add_package(package("openssl-libs", "3.0.1", &["glibc"]));
    store.add_package(package("openssl", "3.0.0", &[]));
    store.add_package(package("glibc", "2.38", &[]));
    store.add_package(package("curl", "8.0", &["openssl-libs"]));

    let id = "FEDORA-2024-0001";
    let newer = advisory("adv-v2", id, "2", Some("2024-02-01"), &[("openssl", "3.0.1")]);
    let older = advisory("adv-v1", id, "1", Some("2024-01-01"), &[("openssl", "3.0.0")]);
    store.add_advisory(newer).unwrap();
    store.add_advisory(older).unwrap();

    let source = store.publish(
        "fedora-updates",
        ids(&["openssl-3.0.1", "openssl-libs-3.0.1", "glibc-2.38", "curl-8.0", "adv-v2"]),
    );
    store.publish("stable", ids(&["openssl-3.0.0", "adv-v1"]));
    (store, source.reference())
}

#[test]
fn test_advisory_copy_replaces_older_revision() {
    let (store, source) = setup();
    let request = CopyRequest::new(vec![mapping(source, "stable", Some(&["adv-v2"]))], true);

    let reports = copy(&store, &request, &Config::default()).unwrap();
    let report = &reports[0];

    // The advisory drags in its package, which drags in its dependencies
    assert_eq!(
        report.added,
        ids(&["adv-v2", "glibc-2.38", "openssl-3.0.1", "openssl-libs-3.0.1"])
    );
    assert_eq!(report.removed, ids(&["adv-v1"]));
    assert!(matches!(report.advisories[0], ReconcileOutcome::Replaced { .. }));
    assert_eq!(report.new_version, VersionRef::new("stable", 1));
    assert!(report.diagnostics.is_empty());
}

#[test]
fn test_advisory_merge_creates_new_record() {
    let store = InMemoryStore::new();
    store.add_package(package("a", "1", &[]));
    store.add_package(package("b", "1", &[]));
    store.add_advisory(advisory("src", "RHBA-1", "3", Some("2024-05-05"), &[("b", "1")])).unwrap();
    store.add_advisory(advisory("dst", "RHBA-1", "3", Some("2024-05-05"), &[("a", "1")])).unwrap();
    let source = store.publish("upstream", ids(&["b-1", "src"]));
    store.publish("stable", ids(&["a-1", "dst"]));

    let request = CopyRequest::new(
        vec![mapping(source.reference(), "stable", Some(&["src"]))],
        true,
    );
    let reports = copy(&store, &request, &Config::default()).unwrap();
    let report = &reports[0];

    let merged = match &report.advisories[0] {
        ReconcileOutcome::Merged { previous, advisory } => {
            assert_eq!(previous, &ContentId::from("dst"));
            advisory.clone()
        }
        other => panic!("expected a merge, got {:?}", other),
    };
    assert_eq!(merged.package_nevras().len(), 2);

    let latest = store.latest_version("stable").unwrap();
    assert!(latest.content.contains(&merged.content_id));
    assert!(!latest.content.contains(&ContentId::from("dst")));
    assert!(latest.content.contains(&ContentId::from("b-1")));
    assert_eq!(store.advisory(&merged.content_id), Some(merged));
}

#[test]
fn test_advisory_date_conflict_keeps_destination() {
    let store = InMemoryStore::new();
    store.add_advisory(advisory("src", "RHSA-9", "1", Some("2024-03-01"), &[])).unwrap();
    store.add_advisory(advisory("dst", "RHSA-9", "1", Some("2024-01-01"), &[])).unwrap();
    let source = store.publish("upstream", ids(&["src"]));
    store.publish("stable", ids(&["dst"]));

    let request = CopyRequest::new(vec![mapping(source.reference(), "stable", None)], true);
    let reports = copy(&store, &request, &Config::default()).unwrap();
    let report = &reports[0];

    assert!(report.added.is_empty());
    assert!(report.removed.is_empty());
    assert!(report
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::AdvisoryConflict { .. })));
    assert_eq!(store.latest_version("stable").unwrap().content, ids(&["dst"]));
}

#[test]
fn test_destination_provider_is_preferred() {
    let store = InMemoryStore::new();
    store.add_package(package("app", "1", &["libfoo"]));
    let mut old = package_with_id("foo-old", "foo", "1", &[]);
    old.provides = common::relations(&["libfoo = 1"]);
    let mut new = package_with_id("foo-new", "foo", "2", &[]);
    new.provides = common::relations(&["libfoo = 2"]);
    store.add_package(old);
    store.add_package(new);
    let source = store.publish("upstream", ids(&["app-1", "foo-old", "foo-new"]));
    store.publish("stable", ids(&["foo-old"]));

    let request = CopyRequest::new(
        vec![mapping(source.reference(), "stable", Some(&["app-1"]))],
        true,
    );
    let reports = copy(&store, &request, &Config::default()).unwrap();
    assert_eq!(reports[0].added, ids(&["app-1"]));
}

#[test]
fn test_static_module_copies_artifacts() {
    let store = InMemoryStore::new();
    store.add_package(package("postgresql-server", "15", &["postgresql-libs"]));
    store.add_package(package("postgresql-libs", "15", &[]));
    store.add_package(package("postgresql-libs", "13", &[]));
    let mut module = ModuleUnit::new("pg-15", "postgresql", "15", 9000, "deadbeef", "x86_64");
    module.packages = vec![
        ContentId::from("postgresql-server-15"),
        ContentId::from("postgresql-libs-15"),
    ];
    module.static_context = true;
    store.add_module(module);
    let source = store.publish(
        "appstream",
        ids(&["pg-15", "postgresql-server-15", "postgresql-libs-15", "postgresql-libs-13"]),
    );
    store.create_repository("stable");

    let request = CopyRequest::new(
        vec![mapping(source.reference(), "stable", Some(&["pg-15"]))],
        false,
    );
    let reports = copy(&store, &request, &Config::default()).unwrap();
    assert_eq!(
        reports[0].added,
        ids(&["pg-15", "postgresql-libs-15", "postgresql-server-15"])
    );
}

#[test]
fn test_strict_mode_leaves_destination_untouched() {
    let store = InMemoryStore::new();
    store.add_package(package("broken", "1", &["does-not-exist"]));
    let source = store.publish("upstream", ids(&["broken-1"]));
    store.create_repository("stable");

    let mut config = Config::default();
    config.copy.strict = true;
    let request = CopyRequest::new(vec![mapping(source.reference(), "stable", None)], true);

    let err = copy(&store, &request, &config).unwrap_err();
    assert!(matches!(err, Error::UnresolvedDependencies { .. }));
    assert_eq!(store.latest_version("stable").unwrap().number, 0);
}

#[test]
fn test_two_mappings_into_one_destination() {
    let store = InMemoryStore::new();
    store.add_package(package("a", "1", &[]));
    store.add_package(package("b", "1", &[]));
    let first = store.publish("one", ids(&["a-1"]));
    let second = store.publish("two", ids(&["b-1"]));
    store.create_repository("stable");

    let request = CopyRequest::new(
        vec![
            mapping(first.reference(), "stable", None),
            mapping(second.reference(), "stable", None),
        ],
        true,
    );
    let reports = copy(&store, &request, &Config::default()).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].sources.len(), 2);
    assert_eq!(store.latest_version("stable").unwrap().content, ids(&["a-1", "b-1"]));
    assert_eq!(store.latest_version("stable").unwrap().number, 1);
}

#[test]
fn test_copy_from_files() {
    let (store, _) = setup();
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.json");
    let request_path = dir.path().join("request.json");
    let config_path = dir.path().join("rpmcopy.toml");
    store.save(&store_path).unwrap();
    std::fs::write(
        &request_path,
        r#"{"config": [{"source_repo_version": "fedora-updates/0", "dest_repo": "stable", "content": ["curl-8.0"]}]}"#,
    )
    .unwrap();
    std::fs::write(&config_path, "[resolver]\nparallel = false\n").unwrap();

    let store = InMemoryStore::load(&store_path).unwrap();
    let request = CopyRequest::load(&request_path).unwrap();
    let config = Config::load(&config_path).unwrap();

    let reports = copy(&store, &request, &config).unwrap();
    assert_eq!(
        reports[0].added,
        ids(&["curl-8.0", "glibc-2.38", "openssl-libs-3.0.1"])
    );

    let json = serde_json::to_value(&reports).unwrap();
    assert_eq!(json[0]["new_version"], "stable/1");
}

#[test]
fn test_merged_advisory_then_second_mapping() {
    let store = InMemoryStore::new();
    store.add_package(package("a", "1", &[]));
    store.add_package(package("b", "1", &[]));
    store.add_package(package("c", "1", &[]));
    store.add_advisory(advisory("src", "RHBA-2", "1", Some("2024-05-05"), &[("b", "1")])).unwrap();
    store.add_advisory(advisory("dst", "RHBA-2", "1", Some("2024-05-05"), &[("a", "1")])).unwrap();
    let updates = store.publish("updates", ids(&["b-1", "src"]));
    let extras = store.publish("extras", ids(&["c-1"]));
    store.publish("stable", ids(&["a-1", "dst"]));

    let request = CopyRequest::new(
        vec![
            mapping(updates.reference(), "stable", Some(&["src"])),
            mapping(extras.reference(), "stable", None),
        ],
        true,
    );
    let reports = copy(&store, &request, &Config::default()).unwrap();
    let report = &reports[0];

    let merged = match &report.advisories[0] {
        ReconcileOutcome::Merged { advisory, .. } => advisory.clone(),
        other => panic!("expected a merge, got {:?}", other),
    };
    let latest = store.latest_version("stable").unwrap();
    assert_eq!(
        latest.content,
        ids(&["a-1", "b-1", "c-1", merged.content_id.0.as_str()])
    );
    assert_eq!(store.advisory(&merged.content_id), Some(merged));
}

#[test]
fn test_merged_advisory_merged_again_by_later_mapping() {
    let store = InMemoryStore::new();
    for name in ["a", "b", "c"] {
        store.add_package(package(name, "1", &[]));
    }
    for (content_id, name) in [("dst", "a"), ("src-b", "b"), ("src-c", "c")] {
        let record = advisory(content_id, "RHBA-3", "1", Some("2024-05-05"), &[(name, "1")]);
        store.add_advisory(record).unwrap();
    }
    let first = store.publish("one", ids(&["b-1", "src-b"]));
    let second = store.publish("two", ids(&["c-1", "src-c"]));
    store.publish("stable", ids(&["a-1", "dst"]));

    let request = CopyRequest::new(
        vec![
            mapping(first.reference(), "stable", Some(&["src-b"])),
            mapping(second.reference(), "stable", Some(&["src-c"])),
        ],
        true,
    );
    let reports = copy(&store, &request, &Config::default()).unwrap();

    let last = match &reports[0].advisories[1] {
        ReconcileOutcome::Merged { advisory, .. } => advisory.clone(),
        other => panic!("expected a merge, got {:?}", other),
    };
    assert_eq!(last.package_nevras().len(), 3);

    let latest = store.latest_version("stable").unwrap();
    assert_eq!(
        latest.content,
        ids(&["a-1", "b-1", "c-1", last.content_id.0.as_str()])
    );
}
