// src/resolver/conflict.rs

//! Version conflict detection
//!
//! Whether a conflict is fatal is decided by the caller: a merged output
//! simply picks the highest version, separate outputs cannot.

use crate::resolver::aggregate::{VersionGroup, VersionSources};
use std::collections::BTreeMap;
use std::fmt;

/// A distribution that resolved to more than one version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    pub name: String,
    pub versions: Vec<VersionSources>,
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  - {}:", self.name)?;
        for entry in &self.versions {
            write!(
                f,
                "\n    - {}=={} coming from {}",
                self.name,
                entry.version,
                entry.sources.join(", ")
            )?;
        }
        Ok(())
    }
}

/// Report every group holding two or more distinct versions, by name
pub fn detect(groups: &BTreeMap<String, VersionGroup>) -> Vec<ConflictReport> {
    groups
        .values()
        .filter(|group| group.has_conflict())
        .map(|group| ConflictReport {
            name: group.name.clone(),
            versions: group.versions.clone(),
        })
        .collect()
}
