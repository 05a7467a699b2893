// src/lib.rs

//! rpmcopy
//!
//! Dependency-aware copying of RPM content between repository versions.
//!
//! # Architecture
//!
//! - Versions: RPM ordering of epoch/version/release (`rpmvercmp`)
//! - Dependencies: simple capabilities and rich boolean expressions
//! - Resolver: provides index, wave-based closure, module rules
//! - Advisories: reconciliation of updateinfo records on copy
//! - Repository: immutable versions behind a [`repository::ContentStore`]

pub mod advisory;
pub mod config;
pub mod copy;
pub mod dependencies;
mod error;
pub mod packages;
pub mod repository;
pub mod resolver;
pub mod version;

pub use advisory::{Advisory, AdvisoryReconciler, ReconcileOutcome};
pub use config::Config;
pub use copy::{CopyReport, copy};
pub use error::{Error, Result};
pub use packages::{Capability, ContentId, ModuleUnit, Nevra, Package};
pub use repository::{ContentStore, CopyRequest, InMemoryStore, RepositoryVersion};
pub use resolver::{ContentUniverse, Diagnostic, Diagnostics, Resolution, Resolver, resolve};
pub use version::{RpmVersion, compare_triples, rpmvercmp};
