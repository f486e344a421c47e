// src/packages/traits.rs

//! Common traits for source archive handling

use crate::error::Result;
use std::path::Path;

/// Read access to the members of a source archive
///
/// Only the wheel-building path looks inside archives; version
/// reconciliation works on file names alone.
pub trait ArchiveIntrospector {
    /// List member paths as stored in the archive
    fn list_members(&self) -> Result<Vec<String>>;

    /// Extract every member below `dest`
    ///
    /// Members whose paths would escape `dest` are rejected.
    fn extract_all(&self, dest: &Path) -> Result<()>;
}
