// src/version/mod.rs

//! Version handling for RPM-style epoch:version-release triples
//!
//! This module provides parsing of EVR strings and the total order used
//! everywhere a version is compared: provider ranking, range matching of
//! capabilities and advisory package identities.
//!
//! Comparison follows the `rpmvercmp` rules:
//! - strings are split into maximal runs of digits and of ASCII letters,
//!   every other character only separates runs
//! - numeric runs compare as unbounded integers, alphabetic runs by code point
//! - a numeric run is newer than an alphabetic run in the same position
//! - `~` sorts before everything, including the end of the string (`1.0~rc1 < 1.0`)
//! - `^` sorts after the end of the string but before any other run (`1.0 < 1.0^git1 < 1.0.1`)

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

/// A parsed RPM version with epoch, version, and release components
///
/// The epoch is kept as a normalized digit string so that arbitrarily large
/// epochs still compare correctly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RpmVersion {
    pub epoch: String,
    pub version: String,
    pub release: Option<String>,
}

impl RpmVersion {
    /// Build a version from its three components
    ///
    /// A missing or empty epoch becomes `"0"`. An epoch that is not a plain
    /// integer is treated as zero rather than rejected.
    pub fn new(epoch: Option<&str>, version: impl Into<String>, release: Option<&str>) -> Self {
        Self {
            epoch: normalize_epoch(epoch.unwrap_or("0")),
            version: version.into(),
            release: release.filter(|r| !r.is_empty()).map(str::to_string),
        }
    }

    /// Parse an RPM version string
    ///
    /// Format: [epoch:]version[-release]
    /// Examples:
    /// - "1.2.3" → epoch=0, version="1.2.3", release=None
    /// - "2:1.2.3" → epoch=2, version="1.2.3", release=None
    /// - "1.2.3-4.el8" → epoch=0, version="1.2.3", release=Some("4.el8")
    /// - "1:2.3.4-5.el8" → epoch=1, version="2.3.4", release=Some("5.el8")
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (epoch_str, rest) = match s.find(':') {
            Some(colon_pos) => (&s[..colon_pos], &s[colon_pos + 1..]),
            None => ("0", s),
        };

        let (version, release) = match rest.find('-') {
            Some(dash_pos) => (&rest[..dash_pos], Some(&rest[dash_pos + 1..])),
            None => (rest, None),
        };

        if version.is_empty() {
            return Err(Error::InvalidVersion(s.to_string()));
        }

        Ok(Self::new(Some(epoch_str), version, release))
    }

    /// Compare two RPM versions
    ///
    /// Epoch decides first, then version; release is only consulted when
    /// both epoch and version are equal.
    pub fn compare(&self, other: &RpmVersion) -> Ordering {
        self.compare_with(other, true)
    }

    /// Compare two versions, optionally ignoring the release
    ///
    /// Releases are also skipped when either side has none, which is how a
    /// requirement such as `foo >= 1.2` matches every release of 1.2.
    pub fn compare_for_match(&self, other: &RpmVersion) -> Ordering {
        let use_release = self.release.is_some() && other.release.is_some();
        self.compare_with(other, use_release)
    }

    fn compare_with(&self, other: &RpmVersion, use_release: bool) -> Ordering {
        match compare_numeric(&self.epoch, &other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match rpmvercmp(&self.version, &other.version) {
            Ordering::Equal => {}
            ord => return ord,
        }

        if !use_release {
            return Ordering::Equal;
        }

        rpmvercmp(
            self.release.as_deref().unwrap_or(""),
            other.release.as_deref().unwrap_or(""),
        )
    }
}

impl fmt::Display for RpmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != "0" {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

impl Ord for RpmVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for RpmVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two (epoch, version, release) string triples
pub fn compare_triples(a: (&str, &str, &str), b: (&str, &str, &str)) -> Ordering {
    let left = RpmVersion::new(Some(a.0), a.1, Some(a.2));
    let right = RpmVersion::new(Some(b.0), b.1, Some(b.2));
    left.compare(&right)
}

fn normalize_epoch(epoch: &str) -> String {
    let epoch = epoch.trim();
    if epoch.is_empty() {
        return "0".to_string();
    }
    if !epoch.bytes().all(|b| b.is_ascii_digit()) {
        debug!("Non-numeric epoch '{}' treated as 0", epoch);
        return "0".to_string();
    }
    let stripped = epoch.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Compare two digit runs as unbounded integers
///
/// Runs that contain anything but ASCII digits count as zero.
/// Compare digit strings as integers of any size; anything else counts as 0
pub(crate) fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = numeric_digits(a);
    let b = numeric_digits(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn numeric_digits(s: &str) -> &str {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return "";
    }
    s.trim_start_matches('0')
}

fn is_separator(c: u8) -> bool {
    !c.is_ascii_alphanumeric() && c != b'~' && c != b'^'
}

/// Segment-wise version comparison in the style of `rpmvercmp`
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    loop {
        while let Some((&c, rest)) = one.split_first() {
            if !is_separator(c) {
                break;
            }
            one = rest;
        }
        while let Some((&c, rest)) = two.split_first() {
            if !is_separator(c) {
                break;
            }
            two = rest;
        }

        // Tilde sorts before everything else
        let one_tilde = one.first() == Some(&b'~');
        let two_tilde = two.first() == Some(&b'~');
        if one_tilde || two_tilde {
            if !one_tilde {
                return Ordering::Greater;
            }
            if !two_tilde {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        // Caret sorts after the end of the string, before anything else
        let one_caret = one.first() == Some(&b'^');
        let two_caret = two.first() == Some(&b'^');
        if one_caret || two_caret {
            if one.is_empty() {
                return Ordering::Less;
            }
            if two.is_empty() {
                return Ordering::Greater;
            }
            if !one_caret {
                return Ordering::Greater;
            }
            if !two_caret {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = one[0].is_ascii_digit();
        let take = |s: &[u8]| -> usize {
            s.iter()
                .take_while(|c| {
                    if numeric {
                        c.is_ascii_digit()
                    } else {
                        c.is_ascii_alphabetic()
                    }
                })
                .count()
        };
        let len_one = take(one);
        let len_two = take(two);
        let (seg_one, rest_one) = one.split_at(len_one);
        let (seg_two, rest_two) = two.split_at(len_two);

        // Segments of different kinds: numeric is newer
        if seg_two.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if numeric {
            let trim = |s: &[u8]| -> usize { s.iter().take_while(|&&c| c == b'0').count() };
            let seg_one = &seg_one[trim(seg_one)..];
            let seg_two = &seg_two[trim(seg_two)..];
            seg_one
                .len()
                .cmp(&seg_two.len())
                .then_with(|| seg_one.cmp(seg_two))
        } else {
            seg_one.cmp(seg_two)
        };

        if ord != Ordering::Equal {
            return ord;
        }

        one = rest_one;
        two = rest_two;
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (false, _) => Ordering::Greater,
        (true, false) => Ordering::Less,
    }
}
