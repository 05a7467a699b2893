// src/commands/copy.rs
//! Copy command

use anyhow::{Context, Result};
use rpmcopy::{Config, CopyRequest, InMemoryStore};
use std::path::Path;
use tracing::info;

/// Run a copy request against a JSON store and print the reports
pub fn cmd_copy(
    store_path: &str,
    request_path: &str,
    config_path: Option<&str>,
    write: bool,
) -> Result<()> {
    let config = match config_path {
        Some(path) => Config::load(Path::new(path))
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => Config::default(),
    };

    let store = InMemoryStore::load(Path::new(store_path))
        .with_context(|| format!("Failed to load store from {}", store_path))?;
    let request = CopyRequest::load(Path::new(request_path))
        .with_context(|| format!("Failed to load copy request from {}", request_path))?;

    let reports = rpmcopy::copy(&store, &request, &config).context("Copy failed")?;

    println!("{}", serde_json::to_string_pretty(&reports)?);

    if write {
        store
            .save(Path::new(store_path))
            .with_context(|| format!("Failed to write store to {}", store_path))?;
        info!("Store written to {}", store_path);
    }

    Ok(())
}
