// src/manifest.rs

//! Requirements files and package exclusions
//!
//! Excluded packages are removed from the requirements files before pip sees
//! them. When a file loses lines, a filtered copy is written next to it and
//! the [`Manifest`] keeps both paths: the copy is what gets downloaded, the
//! original is what gets reported, cached and written back.

use crate::error::Result;
use crate::packages::canonicalize_name;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const FILTERED_PREFIX: &str = "freeze-requirements-filtered-reqs-";

/// A requirements file as given by the user, possibly with a filtered copy
#[derive(Debug)]
pub struct Manifest {
    original: PathBuf,
    filtered: Option<NamedTempFile>,
}

impl Manifest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            original: path.into(),
            filtered: None,
        }
    }

    /// Path to hand to the download tool
    pub fn path(&self) -> &Path {
        match &self.filtered {
            Some(file) => file.path(),
            None => &self.original,
        }
    }

    /// Path of the user's file
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Identifier used in reports and output headers
    pub fn id(&self) -> String {
        self.original.display().to_string()
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered.is_some()
    }
}

/// Packages left out of the frozen output
///
/// An entry is either a package name, excluded everywhere, or
/// `requirements_path:package`, excluded from that file's output only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    names: BTreeSet<String>,
    scoped: BTreeSet<(String, String)>,
}

impl Exclusions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: &str) {
        let entry = entry.trim();
        if entry.is_empty() {
            return;
        }
        match entry.rsplit_once(':') {
            Some((manifest, name)) if !manifest.is_empty() && !name.is_empty() => {
                self.scoped
                    .insert((manifest.to_string(), canonicalize_name(name)));
            }
            _ => {
                self.names.insert(canonicalize_name(entry));
            }
        }
    }

    pub fn extend<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in entries {
            self.add(entry.as_ref());
        }
    }

    /// Add every requirement listed in a requirements file
    pub fn add_requirements_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)?;
        for line in content.lines() {
            if let Some(name) = requirement_name(line) {
                self.names.insert(name);
            }
        }
        Ok(())
    }

    /// Excluded from every output
    pub fn is_excluded(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Excluded from the output of `manifest_id`
    pub fn is_excluded_from(&self, manifest_id: &str, name: &str) -> bool {
        self.is_excluded(name)
            || self
                .scoped
                .contains(&(manifest_id.to_string(), name.to_string()))
    }

    /// Names excluded everywhere, canonicalized
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }
}

/// Canonical distribution name of a requirement line
///
/// Returns `None` for blank lines, comments and option lines such as
/// `-r other.txt` or `--index-url`. URL requirements are named by their
/// `#egg=` fragment.
pub fn requirement_name(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
        return None;
    }

    if let Some((_, fragment)) = line.split_once("#egg=") {
        let name: String = fragment
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect();
        return (!name.is_empty()).then(|| canonicalize_name(&name));
    }

    let name: String = line
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    if name.is_empty() || line[name.len()..].starts_with(':') {
        // Bare URLs and paths without an egg fragment
        return None;
    }
    Some(canonicalize_name(&name))
}

/// Requirements files ready for download
#[derive(Debug, Default)]
pub struct PreparedManifests {
    pub manifests: Vec<Manifest>,
    /// Requirement lines for externally provided wheels, per manifest id
    pub external_lines: BTreeMap<String, Vec<String>>,
}

/// Load requirements files, filtering out excluded packages
///
/// Lines naming a package in `external` are removed from the download like
/// any exclusion, but are kept aside so they can be written back verbatim.
pub fn prepare(
    paths: &[PathBuf],
    exclusions: &Exclusions,
    external: &BTreeSet<String>,
) -> Result<PreparedManifests> {
    let mut prepared = PreparedManifests::default();

    for path in paths {
        let mut manifest = Manifest::new(path);
        if exclusions.names().is_empty() {
            prepared.manifests.push(manifest);
            continue;
        }

        let content = fs::read_to_string(path)?;
        let mut kept = Vec::new();
        let mut removed = 0usize;
        for line in content.lines() {
            match requirement_name(line) {
                Some(name) if exclusions.is_excluded(&name) => {
                    debug!("Excluding {} from {}", name, path.display());
                    removed += 1;
                    if external.contains(&name) {
                        prepared
                            .external_lines
                            .entry(manifest.id())
                            .or_default()
                            .push(line.trim().to_string());
                    }
                }
                _ => kept.push(line),
            }
        }

        if removed > 0 {
            manifest.filtered = Some(write_filtered(path, &kept)?);
            info!(
                "Filtered {} excluded requirement(s) out of {}",
                removed,
                path.display()
            );
        }
        prepared.manifests.push(manifest);
    }

    Ok(prepared)
}

/// Write the kept lines next to the original so relative includes still work
fn write_filtered(original: &Path, lines: &[&str]) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(FILTERED_PREFIX).suffix(".txt");

    let parent = original
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = match builder.tempfile_in(parent) {
        Ok(file) => file,
        Err(e) => {
            debug!("Cannot write filtered copy in {}: {}", parent.display(), e);
            builder.tempfile()?
        }
    };

    for line in lines {
        writeln!(file, "{}", line)?;
    }
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_name() {
        assert_eq!(requirement_name("Django>=1.4"), Some("django".to_string()));
        assert_eq!(requirement_name("  zope.interface == 4.0 "), Some("zope-interface".to_string()));
        assert_eq!(requirement_name("requests[security]~=2.0"), Some("requests".to_string()));
        assert_eq!(requirement_name("foo ; python_version < '3'"), Some("foo".to_string()));
        assert_eq!(
            requirement_name("git+https://example.com/repo.git#egg=My_Pkg"),
            Some("my-pkg".to_string())
        );
        assert_eq!(requirement_name("https://example.com/foo.tar.gz"), None);
        assert_eq!(requirement_name("# comment"), None);
        assert_eq!(requirement_name("-r base.txt"), None);
        assert_eq!(requirement_name(""), None);
    }

    #[test]
    fn test_exclusions() {
        let mut exclusions = Exclusions::new();
        exclusions.extend(["Foo_Bar", "reqs/r1.txt:baz", ""]);

        assert!(exclusions.is_excluded("foo-bar"));
        assert!(!exclusions.is_excluded("baz"));
        assert!(exclusions.is_excluded_from("reqs/r1.txt", "baz"));
        assert!(!exclusions.is_excluded_from("reqs/r2.txt", "baz"));
        assert!(exclusions.is_excluded_from("reqs/r2.txt", "foo-bar"));
    }

    #[test]
    fn test_exclusions_from_requirements_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exclude.txt");
        fs::write(&path, "# comment\nfoo==1.0\n\nBar\n").unwrap();

        let mut exclusions = Exclusions::new();
        exclusions.add_requirements_file(&path).unwrap();
        assert!(exclusions.is_excluded("foo"));
        assert!(exclusions.is_excluded("bar"));
        assert_eq!(exclusions.names().len(), 2);
    }

    #[test]
    fn test_prepare_filters_excluded_lines() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = dir.path().join("r1.txt");
        let r2 = dir.path().join("r2.txt");
        fs::write(&r1, "foo==1.0\nbar>=0.1\nextwheel==2.0\n").unwrap();
        fs::write(&r2, "baz\n").unwrap();

        let mut exclusions = Exclusions::new();
        exclusions.extend(["bar", "extwheel"]);
        let external: BTreeSet<String> = ["extwheel".to_string()].into();

        let prepared = prepare(&[r1.clone(), r2.clone()], &exclusions, &external).unwrap();
        assert_eq!(prepared.manifests.len(), 2);

        let first = &prepared.manifests[0];
        assert!(first.is_filtered());
        assert_eq!(first.original(), r1.as_path());
        assert_ne!(first.path(), r1.as_path());
        assert_eq!(fs::read_to_string(first.path()).unwrap(), "foo==1.0\n");

        let second = &prepared.manifests[1];
        assert!(!second.is_filtered());
        assert_eq!(second.path(), r2.as_path());

        assert_eq!(
            prepared.external_lines.get(&first.id()),
            Some(&vec!["extwheel==2.0".to_string()])
        );
    }

    #[test]
    fn test_filtered_copy_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let r1 = dir.path().join("r1.txt");
        fs::write(&r1, "foo\nbar\n").unwrap();

        let mut exclusions = Exclusions::new();
        exclusions.add("bar");
        let prepared = prepare(&[r1], &exclusions, &BTreeSet::new()).unwrap();
        let filtered = prepared.manifests[0].path().to_path_buf();
        assert!(filtered.exists());

        drop(prepared);
        assert!(!filtered.exists());
    }
}
