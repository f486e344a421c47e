// src/packages/wheel.rs

//! Wheel building for downloaded source archives
//!
//! Wheels are built by `pip wheel --no-deps`. Some sdists make pip exit
//! without producing anything (a non-string version in setup.py is the usual
//! culprit), so when the wheel directory stays empty the archive is
//! extracted and `setup.py sdist bdist_wheel` is run by hand.

use crate::error::{Error, Result};
use crate::packages::archive::SourceArchive;
use crate::packages::identity::{self, DistributionIdentity};
use crate::packages::traits::ArchiveIntrospector;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Runs setup.py with setuptools imported, whatever the script itself imports
const SETUPTOOLS_SHIM: &str = "import setuptools;__file__='setup.py';\
exec(compile(open(__file__).read().replace('\\r\\n', '\\n'), __file__, 'exec'))";

const WORK_DIR_PREFIX: &str = "freeze-requirements-";

/// A wheel file living in a temporary directory
///
/// The directory is removed when this value is dropped, so the wheel must be
/// moved somewhere permanent first.
#[derive(Debug)]
pub struct BuiltWheel {
    _dir: TempDir,
    path: PathBuf,
}

impl BuiltWheel {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Builds wheels with external pip and python executables
#[derive(Debug, Clone)]
pub struct WheelBuilder {
    pip: PathBuf,
    python: PathBuf,
}

impl WheelBuilder {
    pub fn new(pip: impl Into<PathBuf>, python: impl Into<PathBuf>) -> Self {
        Self {
            pip: pip.into(),
            python: python.into(),
        }
    }

    /// Build a wheel from `source_archive`
    pub fn build(&self, source_archive: &Path) -> Result<BuiltWheel> {
        let package = source_archive.display().to_string();
        let wheel_dir = work_dir()?;

        debug!("Running pip wheel for {}", package);
        let output = Command::new(&self.pip)
            .arg("wheel")
            .arg("--no-deps")
            .arg("--wheel-dir")
            .arg(wheel_dir.path())
            .arg(source_archive)
            .output();

        match output {
            Ok(output) if !output.status.success() => {
                warn!(
                    "pip wheel failed for {}: {}",
                    package,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Ok(_) => {}
            Err(e) => {
                return Err(Error::WheelBuild {
                    package,
                    reason: format!("Failed to run {}: {}", self.pip.display(), e),
                });
            }
        }

        if let Some(path) = first_wheel(wheel_dir.path())? {
            return Ok(BuiltWheel {
                _dir: wheel_dir,
                path,
            });
        }

        info!("pip produced no wheel for {}, running setup.py", package);
        self.build_with_setup_py(source_archive)
    }

    fn build_with_setup_py(&self, source_archive: &Path) -> Result<BuiltWheel> {
        let package = source_archive.display().to_string();
        let build_dir = work_dir()?;

        let archive = SourceArchive::open(source_archive)?;
        archive.extract_all(build_dir.path())?;
        let source_dir = build_dir.path().join(archive.common_root()?);

        let output = Command::new(&self.python)
            .arg("-c")
            .arg(SETUPTOOLS_SHIM)
            .arg("sdist")
            .arg("bdist_wheel")
            .current_dir(&source_dir)
            .output()
            .map_err(|e| Error::WheelBuild {
                package: package.clone(),
                reason: format!("Failed to run {}: {}", self.python.display(), e),
            })?;

        if !output.status.success() {
            return Err(Error::WheelBuild {
                package,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match first_wheel(&source_dir.join("dist"))? {
            Some(path) => Ok(BuiltWheel {
                _dir: build_dir,
                path,
            }),
            None => Err(Error::WheelBuild {
                package,
                reason: "setup.py bdist_wheel produced no wheel".to_string(),
            }),
        }
    }
}

fn work_dir() -> Result<TempDir> {
    Ok(tempfile::Builder::new().prefix(WORK_DIR_PREFIX).tempdir()?)
}

/// First `.whl` file in `dir` by name, if any
fn first_wheel(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut wheels = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "whl") {
            wheels.push(path);
        }
    }
    wheels.sort();
    Ok(wheels.into_iter().next())
}

/// Find a wheel for `identity` already present in `dir`
pub fn find_existing_wheel(dir: &Path, identity: &DistributionIdentity) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        if !name.ends_with(".whl") {
            continue;
        }
        let matches = identity::resolve(&name).is_ok_and(|found| {
            found.name == identity.name
                && escape_version(&found.version) == escape_version(&identity.version)
        });
        if matches {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

/// Version as written in wheel file names
///
/// Every run of characters other than letters, digits and `.` becomes a
/// single `_`, so `2013-01-29` is found as `2013_01_29`.
fn escape_version(version: &str) -> String {
    let mut escaped = String::with_capacity(version.len());
    let mut in_run = false;
    for c in version.chars() {
        if c.is_alphanumeric() || c == '.' {
            escaped.extend(c.to_lowercase());
            in_run = false;
        } else if !in_run {
            escaped.push('_');
            in_run = true;
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_existing_wheel() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Foo_Bar-1.0-py3-none-any.whl"), b"").unwrap();
        fs::write(dir.path().join("foo-bar-1.0.tar.gz"), b"").unwrap();

        let wanted = identity::resolve("foo-bar-1.0.tar.gz").unwrap();
        let found = find_existing_wheel(dir.path(), &wanted).unwrap();
        assert_eq!(
            found,
            Some(dir.path().join("Foo_Bar-1.0-py3-none-any.whl"))
        );

        let other = identity::resolve("foo-bar-1.1.tar.gz").unwrap();
        assert!(find_existing_wheel(dir.path(), &other).unwrap().is_none());
        assert!(
            find_existing_wheel(&dir.path().join("missing"), &wanted)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_find_existing_wheel_with_escaped_version() {
        let dir = tempfile::tempdir().unwrap();
        let wheel = "lizard-2013_01_29_16_44_48.878536-py3-none-any.whl";
        fs::write(dir.path().join(wheel), b"").unwrap();

        let wanted = identity::resolve("lizard-2013-01-29-16-44-48.878536.tar.gz").unwrap();
        assert_eq!(
            find_existing_wheel(dir.path(), &wanted).unwrap(),
            Some(dir.path().join(wheel))
        );
    }

    #[test]
    fn test_escape_version() {
        assert_eq!(escape_version("1.0"), "1.0");
        assert_eq!(escape_version("2013-01-29"), "2013_01_29");
        assert_eq!(escape_version("1.0+local--x"), "1.0_local_x");
        assert_eq!(escape_version("1.0RC1"), "1.0rc1");
    }

    #[test]
    fn test_first_wheel_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b-1.0-py3-none-any.whl"), b"").unwrap();
        fs::write(dir.path().join("a-1.0.tar.gz"), b"").unwrap();
        fs::write(dir.path().join("a-1.0-py3-none-any.whl"), b"").unwrap();

        let found = first_wheel(dir.path()).unwrap();
        assert_eq!(found, Some(dir.path().join("a-1.0-py3-none-any.whl")));
    }

    #[test]
    fn test_missing_pip_is_reported() {
        let builder = WheelBuilder::new("/nonexistent/pip", "/nonexistent/python");
        let result = builder.build(Path::new("foo-1.0.tar.gz"));
        assert!(matches!(result, Err(Error::WheelBuild { .. })));
    }
}
