// src/config.rs

//! Run configuration
//!
//! Everything comes from the command line, except the cache location which
//! may be overridden with `FREEZE_REQUIREMENTS_CACHE_DIR`.

use crate::error::{Error, Result};
use crate::formatter::{DEFAULT_LOOSE_SUFFIX, DEFAULT_SEPARATE_SUFFIX};
use crate::resolver::{ConflictPolicy, DEFAULT_MAX_ATTEMPTS};
use std::collections::BTreeSet;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "FREEZE_REQUIREMENTS_CACHE_DIR";

const CACHE_DIR_NAME: &str = "freeze-requirements";

/// Settings of a `freeze` run
#[derive(Debug, Clone)]
pub struct FreezeConfig {
    pub requirements: Vec<PathBuf>,
    pub output_dir: Option<PathBuf>,
    /// Merged output path, `-` for stdout
    pub merged: Option<String>,
    pub separate: bool,
    pub separate_suffix: String,
    pub cache_dependencies: bool,
    pub pip: PathBuf,
    pub python: PathBuf,
    pub build_wheels: bool,
    pub rebuild_wheels: bool,
    pub excluded: Vec<String>,
    pub exclude_requirements: Vec<PathBuf>,
    pub ext_wheels: Vec<String>,
    pub index_url: Option<String>,
    pub find_links: Vec<String>,
    pub loose: BTreeSet<String>,
    pub loose_requirements: bool,
    pub loose_suffix: String,
    pub max_attempts: usize,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            requirements: Vec::new(),
            output_dir: None,
            merged: None,
            separate: false,
            separate_suffix: DEFAULT_SEPARATE_SUFFIX.to_string(),
            cache_dependencies: false,
            pip: PathBuf::from("pip"),
            python: PathBuf::from("python"),
            build_wheels: false,
            rebuild_wheels: true,
            excluded: Vec::new(),
            exclude_requirements: Vec::new(),
            ext_wheels: Vec::new(),
            index_url: None,
            find_links: Vec::new(),
            loose: BTreeSet::new(),
            loose_requirements: false,
            loose_suffix: DEFAULT_LOOSE_SUFFIX.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl FreezeConfig {
    /// Check option combinations before doing any work
    pub fn validate(&self) -> Result<()> {
        if self.requirements.is_empty() {
            return Err(Error::Config("No requirements file given".to_string()));
        }
        for path in &self.requirements {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "Requirements file does not exist: {}",
                    path.display()
                )));
            }
        }
        match &self.output_dir {
            Some(dir) if !dir.is_dir() => Err(Error::Config(format!(
                "Output directory does not exist: {}",
                dir.display()
            ))),
            None if self.build_wheels => Err(Error::Config(
                "Using --build-wheels without --output-dir makes no sense".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Conflicts only matter when each file is frozen on its own
    pub fn conflict_policy(&self) -> ConflictPolicy {
        if self.separate {
            ConflictPolicy::Strict
        } else {
            ConflictPolicy::Tolerant
        }
    }
}

/// Directory holding the dependency cache
pub fn cache_root() -> Result<PathBuf> {
    cache_root_from(env::var_os(CACHE_DIR_ENV))
}

/// Cache root for an explicit override value
pub fn cache_root_from(override_dir: Option<OsString>) -> Result<PathBuf> {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::cache_dir()
        .map(|dir| dir.join(CACHE_DIR_NAME))
        .ok_or_else(|| {
            Error::Config(format!(
                "Cannot determine the user cache directory, set {}",
                CACHE_DIR_ENV
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config_with_requirements() -> (tempfile::TempDir, FreezeConfig) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        fs::write(&path, "foo\n").unwrap();
        let config = FreezeConfig {
            requirements: vec![path],
            ..Default::default()
        };
        (dir, config)
    }

    #[test]
    fn test_defaults() {
        let config = FreezeConfig::default();
        assert_eq!(config.separate_suffix, "-frozen");
        assert_eq!(config.loose_suffix, "-loose");
        assert_eq!(config.max_attempts, 10);
        assert!(config.rebuild_wheels);
        assert_eq!(config.conflict_policy(), ConflictPolicy::Tolerant);
    }

    #[test]
    fn test_validate() {
        let (dir, mut config) = config_with_requirements();
        assert!(config.validate().is_ok());

        config.build_wheels = true;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.output_dir = Some(dir.path().join("missing"));
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.output_dir = Some(dir.path().to_path_buf());
        assert!(config.validate().is_ok());

        config.requirements.push(dir.path().join("nope.txt"));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_separate_requirements_are_strict() {
        let config = FreezeConfig {
            separate: true,
            ..Default::default()
        };
        assert_eq!(config.conflict_policy(), ConflictPolicy::Strict);
    }

    #[test]
    fn test_cache_root_override() {
        let root = cache_root_from(Some(OsString::from("/tmp/frc"))).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/frc"));

        // An empty override falls back to the user cache dir
        if let Ok(root) = cache_root_from(Some(OsString::new())) {
            assert!(root.ends_with("freeze-requirements"));
        }
    }
}
