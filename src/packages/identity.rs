// src/packages/identity.rs

//! Distribution identity resolution from archive file names
//!
//! A downloaded archive only tells us its file name. The name and version
//! are recovered by trying every split of the dash-separated stem, shortest
//! name (longest trailing version) first, and keeping the first candidate
//! whose version starts with a digit.

use crate::error::{Error, Result};
use std::fmt;

/// Source archive extensions, longest first so `.tar.gz` wins over `.tar`
const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".tar.bz2", ".tar.gz", ".tar.xz", ".tbz", ".tgz", ".txz", ".tar", ".zip",
];

const WHEEL_EXTENSION: &str = ".whl";

/// Canonical name and version of a distribution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DistributionIdentity {
    pub name: String,
    pub version: String,
}

impl fmt::Display for DistributionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

/// Normalize a distribution name for comparison
///
/// Lowercases the name and collapses every run of `-`, `_` and `.` into a
/// single `-`.
pub fn canonicalize_name(name: &str) -> String {
    let mut canonical = String::with_capacity(name.len());
    let mut in_separator = false;

    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                canonical.push('-');
                in_separator = true;
            }
        } else {
            canonical.extend(c.to_lowercase());
            in_separator = false;
        }
    }

    canonical
}

/// Strip a known source archive extension, case-insensitively
fn strip_archive_extension(filename: &str) -> Option<&str> {
    let lower = filename.to_ascii_lowercase();
    ARCHIVE_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| &filename[..filename.len() - ext.len()])
}

/// Enumerate `(name, version)` splits of an archive file name
///
/// Candidates come shortest name first. Unknown extensions produce no
/// candidates.
pub fn candidates(archive_name: &str) -> Vec<(String, String)> {
    let Some(stem) = strip_archive_extension(archive_name) else {
        return Vec::new();
    };

    let parts: Vec<&str> = stem.split('-').collect();
    (1..=parts.len())
        .map(|p| (parts[..p].join("-"), parts[p..].join("-")))
        .collect()
}

fn looks_like_version(version: &str) -> bool {
    version.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn unresolvable(archive_name: &str) -> Error {
    Error::UnresolvableIdentity {
        archive: archive_name.to_string(),
        manifest: None,
    }
}

/// Resolve an archive file name to its distribution identity
///
/// Wheel files carry the name and version in their first two fields; any
/// other supported archive goes through candidate enumeration.
pub fn resolve(archive_name: &str) -> Result<DistributionIdentity> {
    if let Some(stem) = archive_name.strip_suffix(WHEEL_EXTENSION) {
        let mut fields = stem.split('-');
        if let (Some(name), Some(version)) = (fields.next(), fields.next())
            && looks_like_version(version)
        {
            return Ok(DistributionIdentity {
                name: canonicalize_name(name),
                version: version.to_string(),
            });
        }
        return Err(unresolvable(archive_name));
    }

    candidates(archive_name)
        .into_iter()
        .find(|(name, version)| !name.is_empty() && looks_like_version(version))
        .map(|(name, version)| DistributionIdentity {
            name: canonicalize_name(&name),
            version,
        })
        .ok_or_else(|| unresolvable(archive_name))
}
