// src/commands/vercmp.rs
//! Version comparison command

use anyhow::{Context, Result};
use rpmcopy::RpmVersion;
use std::cmp::Ordering;

/// Print -1, 0 or 1 like rpmdev-vercmp's exit status
pub fn cmd_vercmp(left: &str, right: &str) -> Result<()> {
    let a = RpmVersion::parse(left)
        .with_context(|| format!("Failed to parse version '{}'", left))?;
    let b = RpmVersion::parse(right)
        .with_context(|| format!("Failed to parse version '{}'", right))?;

    let result = match a.compare(&b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    };
    println!("{}", result);
    Ok(())
}
