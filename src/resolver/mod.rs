// src/resolver/mod.rs

//! Version reconciliation across requirements files
//!
//! The resolver downloads (or reads from cache) the packages of every
//! requirements file, groups them by distribution and checks for versions
//! conflicts. When conflicts are not acceptable, the cache entries involved
//! are dropped and everything is fetched again, a bounded number of times.
//!
//! Dropping cache entries only helps when the upstream resolution is not
//! deterministic; a real conflict exhausts the attempts and is reported.

pub mod aggregate;
pub mod conflict;

pub use aggregate::{VersionGroup, VersionSources, aggregate};
pub use conflict::{ConflictReport, detect};

use crate::cache::{self, DependencyCache};
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::repository::{Fetcher, PackageSink};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Attempts made before giving up on conflicts
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

const WORK_DIR_PREFIX: &str = "freeze-requirements-";

/// Packages resolved for one requirements file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestResult {
    pub manifest_id: String,
    pub packages: Vec<String>,
}

impl ManifestResult {
    pub fn new(manifest_id: impl Into<String>, packages: Vec<String>) -> Self {
        Self {
            manifest_id: manifest_id.into(),
            packages,
        }
    }
}

/// How versions conflicts are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Conflicts are fine, the highest version wins (merged output)
    #[default]
    Tolerant,
    /// Every distribution must resolve to a single version (separate outputs)
    Strict,
}

/// Outcome of a successful resolution
#[derive(Debug, Clone)]
pub struct Resolution {
    pub manifests: Vec<ManifestResult>,
    pub groups: BTreeMap<String, VersionGroup>,
    pub attempts: usize,
}

/// Drives fetching, grouping and conflict checking
pub struct Resolver<'a> {
    fetcher: &'a dyn Fetcher,
    cache: Option<&'a mut DependencyCache>,
    sink: Option<&'a dyn PackageSink>,
    policy: ConflictPolicy,
    max_attempts: usize,
    tolerated: BTreeSet<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self {
            fetcher,
            cache: None,
            sink: None,
            policy: ConflictPolicy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            tolerated: BTreeSet::new(),
        }
    }

    pub fn with_cache(mut self, cache: &'a mut DependencyCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_sink(mut self, sink: &'a dyn PackageSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Total number of attempts; zero is treated as one
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Canonical names whose conflicts never fail a strict resolution
    pub fn tolerate<I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.tolerated.extend(names);
        self
    }

    /// Resolve every requirements file into a conflict checked result
    pub fn resolve(&mut self, manifests: &[Manifest]) -> Result<Resolution> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("Resolution attempt {}/{}", attempt, self.max_attempts);

            let results = self.fetch_all(manifests)?;
            let groups = aggregate(&results)?;
            let conflicts = self.blocking_conflicts(&groups);

            if conflicts.is_empty() {
                info!(
                    "Resolved {} distributions from {} requirements file(s)",
                    groups.len(),
                    results.len()
                );
                return Ok(Resolution {
                    manifests: results,
                    groups,
                    attempts: attempt,
                });
            }

            warn!("Found versions conflicts:");
            for conflict in &conflicts {
                warn!("{}", conflict);
            }

            // Without invalidated entries the next attempt would see the same packages
            if attempt >= self.max_attempts || self.invalidate(&conflicts)? == 0 {
                return Err(Error::UnresolvedConflicts {
                    attempts: attempt,
                    conflicts,
                });
            }

            info!("Trying to automatically resolve conflicts by reprocessing cached dependencies");
        }
    }

    fn blocking_conflicts(&self, groups: &BTreeMap<String, VersionGroup>) -> Vec<ConflictReport> {
        match self.policy {
            ConflictPolicy::Tolerant => Vec::new(),
            ConflictPolicy::Strict => detect(groups)
                .into_iter()
                .filter(|conflict| !self.tolerated.contains(&conflict.name))
                .collect(),
        }
    }

    /// Drop cached entries of conflicting distributions, returning how many went
    fn invalidate(&mut self, conflicts: &[ConflictReport]) -> Result<usize> {
        let Some(cache) = self.cache.as_deref_mut() else {
            return Ok(0);
        };
        let mut deleted = 0;
        for conflict in conflicts {
            deleted += cache.invalidate_by_name(&conflict.name)?;
        }
        Ok(deleted)
    }

    /// Packages of every requirements file, from cache or freshly fetched
    ///
    /// Cache updates are committed once every file has been fetched.
    fn fetch_all(&self, manifests: &[Manifest]) -> Result<Vec<ManifestResult>> {
        let mut results = Vec::with_capacity(manifests.len());
        let mut cache_updates = Vec::new();

        for manifest in manifests {
            let id = manifest.id();
            let hash = if self.cache.is_some() {
                Some(cache::content_hash(manifest.original())?)
            } else {
                None
            };

            if let (Some(cache), Some(hash)) = (self.cache.as_deref(), hash.as_deref())
                && let Some(packages) = cache.lookup(hash)
            {
                info!("{} dependencies found in cache", id);
                results.push(ManifestResult::new(id, packages));
                continue;
            }

            let packages = self.fetch_one(manifest)?;
            if let Some(hash) = hash {
                cache_updates.push((hash, packages.clone()));
            }
            results.push(ManifestResult::new(id, packages));
        }

        if let Some(cache) = self.cache.as_deref() {
            for (hash, packages) in &cache_updates {
                cache.store(hash, packages)?;
            }
        }

        Ok(results)
    }

    /// Fetch one requirements file into a work directory owned by this call
    fn fetch_one(&self, manifest: &Manifest) -> Result<Vec<String>> {
        let work_dir = tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir()?;

        let id = manifest.id();
        let mut packages = self
            .fetcher
            .fetch(manifest.path(), work_dir.path())
            .map_err(|e| e.required_by(&id))?;
        packages.sort();

        if let Some(sink) = self.sink {
            sink.collect(work_dir.path(), &packages)
                .map_err(|e| e.required_by(&id))?;
        }

        Ok(packages)
    }
}
