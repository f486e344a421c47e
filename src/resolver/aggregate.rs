// src/resolver/aggregate.rs

//! Grouping of resolved packages by distribution
//!
//! Every package of every requirements file is resolved to its identity and
//! recorded under its canonical name. Versions are kept sorted at all times
//! by binary insertion, so the last version of a group is the highest one.

use crate::error::Result;
use crate::packages::identity;
use crate::resolver::ManifestResult;
use crate::version::LooseVersion;
use std::collections::BTreeMap;

/// One version of a distribution and the requirements files that led to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSources {
    pub version: String,
    /// One entry per occurrence, duplicates included
    pub sources: Vec<String>,
}

/// All versions of a distribution seen across requirements files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionGroup {
    pub name: String,
    pub versions: Vec<VersionSources>,
}

impl VersionGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: Vec::new(),
        }
    }

    /// Record that `source` resolved this distribution to `version`
    pub fn add(&mut self, version: &str, source: &str) {
        let key = LooseVersion::new(version);
        let index = match self
            .versions
            .binary_search_by(|entry| LooseVersion::new(entry.version.as_str()).cmp(&key))
        {
            Ok(index) => index,
            Err(index) => {
                self.versions.insert(
                    index,
                    VersionSources {
                        version: version.to_string(),
                        sources: Vec::new(),
                    },
                );
                index
            }
        };
        self.versions[index].sources.push(source.to_string());
    }

    /// Highest version; groups built by [`aggregate`] are never empty
    pub fn highest(&self) -> Option<&VersionSources> {
        self.versions.last()
    }

    pub fn has_conflict(&self) -> bool {
        self.versions.len() > 1
    }
}

/// Group the packages of all requirements files by canonical name
pub fn aggregate(results: &[ManifestResult]) -> Result<BTreeMap<String, VersionGroup>> {
    let mut groups: BTreeMap<String, VersionGroup> = BTreeMap::new();

    for result in results {
        for package in &result.packages {
            let distribution = identity::resolve(package)
                .map_err(|e| e.required_by(&result.manifest_id))?;
            groups
                .entry(distribution.name.clone())
                .or_insert_with(|| VersionGroup::new(distribution.name.clone()))
                .add(&distribution.version, &result.manifest_id);
        }
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn result(manifest: &str, packages: &[&str]) -> ManifestResult {
        ManifestResult::new(manifest, packages.iter().map(|p| p.to_string()).collect())
    }

    fn entry(version: &str, sources: &[&str]) -> VersionSources {
        VersionSources {
            version: version.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn sample() -> Vec<ManifestResult> {
        vec![
            result("r1.txt", &["foo-1.3.tar.gz", "bar-0.1.tar.gz"]),
            result("r2.txt", &["foo-1.4.tar.gz", "bar-0.1.tar.gz"]),
            result(
                "r3.txt",
                &[
                    "baz-2014-01-29-16-44-48.878536.tar.gz",
                    "baz-2013-01-29-16-44-48.878536.tar.gz",
                ],
            ),
        ]
    }

    #[test]
    fn test_group_and_sort_versions() {
        let groups = aggregate(&sample()).unwrap();

        assert_eq!(groups.len(), 3);
        assert_eq!(
            groups["foo"].versions,
            vec![entry("1.3", &["r1.txt"]), entry("1.4", &["r2.txt"])]
        );
        assert_eq!(
            groups["bar"].versions,
            vec![entry("0.1", &["r1.txt", "r2.txt"])]
        );
        assert_eq!(
            groups["baz"].versions,
            vec![
                entry("2013-01-29-16-44-48.878536", &["r3.txt"]),
                entry("2014-01-29-16-44-48.878536", &["r3.txt"]),
            ]
        );
    }

    #[test]
    fn test_manifest_order_does_not_change_versions() {
        let mut reversed = sample();
        reversed.reverse();

        let forward = aggregate(&sample()).unwrap();
        let backward = aggregate(&reversed).unwrap();

        assert_eq!(forward.keys().collect::<Vec<_>>(), backward.keys().collect::<Vec<_>>());
        for (name, group) in &forward {
            let other = &backward[name];
            assert_eq!(group.versions.len(), other.versions.len());
            for (a, b) in group.versions.iter().zip(&other.versions) {
                assert_eq!(a.version, b.version);
                let mut left = a.sources.clone();
                let mut right = b.sources.clone();
                left.sort();
                right.sort();
                assert_eq!(left, right);
            }
        }
    }

    #[test]
    fn test_sources_keep_multiplicity() {
        let groups = aggregate(&[result("r1.txt", &["foo-1.0.tar.gz", "Foo-1.0.zip"])]).unwrap();
        assert_eq!(groups["foo"].versions, vec![entry("1.0", &["r1.txt", "r1.txt"])]);
    }

    #[test]
    fn test_highest_version() {
        let groups = aggregate(&[result(
            "r1.txt",
            &["foo-1.10.tar.gz", "foo-1.9.tar.gz", "foo-1.10b1.tar.gz"],
        )])
        .unwrap();
        let foo = &groups["foo"];
        assert!(foo.has_conflict());
        assert_eq!(foo.highest().unwrap().version, "1.10b1");
        assert_eq!(foo.versions[0].version, "1.9");
    }

    #[test]
    fn test_unresolvable_package_aborts() {
        let result = aggregate(&[result("r1.txt", &["foo-1.0.tar.gz", "garbage.tar.gz"])]);
        match result {
            Err(Error::UnresolvableIdentity { archive, manifest }) => {
                assert_eq!(archive, "garbage.tar.gz");
                assert_eq!(manifest.as_deref(), Some("r1.txt"));
            }
            other => panic!("expected unresolvable identity, got {:?}", other),
        }
    }
}
