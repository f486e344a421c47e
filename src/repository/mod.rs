// src/repository/mod.rs

//! Package downloading and placement
//!
//! This module provides the collaborators the resolver talks to:
//! - [`Fetcher`]: downloads the packages a requirements file resolves to
//! - [`PackageSink`]: receives freshly downloaded packages before their
//!   work directory goes away
//!
//! [`PipFetcher`] and [`OutputCollector`] are the real implementations.

use crate::error::{Error, Result};
use crate::packages::identity;
use crate::packages::wheel::{self, WheelBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Downloads the package archives required by a requirements file
pub trait Fetcher {
    /// Download into `dest` and return the archive file names
    fn fetch(&self, manifest: &Path, dest: &Path) -> Result<Vec<String>>;
}

/// Receives downloaded packages while they are still in `dir`
pub trait PackageSink {
    fn collect(&self, dir: &Path, packages: &[String]) -> Result<()>;
}

/// Fetcher running `pip download` for source distributions
#[derive(Debug, Clone)]
pub struct PipFetcher {
    pip: PathBuf,
}

impl PipFetcher {
    pub fn new(pip: impl Into<PathBuf>) -> Self {
        Self {
            pip: pip.into(),
        }
    }
}

impl Fetcher for PipFetcher {
    fn fetch(&self, manifest: &Path, dest: &Path) -> Result<Vec<String>> {
        info!("Downloading packages for {}", manifest.display());

        let output = Command::new(&self.pip)
            .arg("download")
            .arg("--requirement")
            .arg(manifest)
            .arg("--dest")
            .arg(dest)
            .arg("--no-binary")
            .arg(":all:")
            .output()
            .map_err(|e| Error::Fetch {
                manifest: manifest.display().to_string(),
                stdout: String::new(),
                stderr: format!("Failed to run {}: {}", self.pip.display(), e),
            })?;

        if !output.status.success() {
            return Err(Error::Fetch {
                manifest: manifest.display().to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        list_packages(dest)
    }
}

/// File names in `dir`, sorted
pub fn list_packages(dir: &Path) -> Result<Vec<String>> {
    let mut packages = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            packages.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    packages.sort();
    debug!("{} packages in {}", packages.len(), dir.display());
    Ok(packages)
}

/// Sink moving packages to `<output_dir>/<canonical name>/`, building
/// wheels on the way when asked to
#[derive(Debug, Clone)]
pub struct OutputCollector {
    output_dir: PathBuf,
    wheels: Option<WheelBuilder>,
    rebuild_wheels: bool,
}

impl OutputCollector {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            wheels: None,
            rebuild_wheels: true,
        }
    }

    /// Build a wheel next to every collected package
    ///
    /// With `rebuild` off, packages that already have a matching wheel in
    /// their destination directory are not rebuilt.
    pub fn with_wheels(mut self, builder: WheelBuilder, rebuild: bool) -> Self {
        self.wheels = Some(builder);
        self.rebuild_wheels = rebuild;
        self
    }

    fn collect_one(&self, dir: &Path, package: &str) -> Result<()> {
        let distribution = identity::resolve(package)?;
        let dest_dir = self.output_dir.join(&distribution.name);
        fs::create_dir_all(&dest_dir)?;
        let source = dir.join(package);

        if let Some(builder) = &self.wheels {
            let existing = if self.rebuild_wheels {
                None
            } else {
                wheel::find_existing_wheel(&dest_dir, &distribution)?
            };
            match existing {
                Some(path) => info!("{} already built, skipped", path.display()),
                None => {
                    info!("Building wheel for {}", package);
                    let built = builder.build(&source)?;
                    move_file(built.path(), &dest_dir.join(built.file_name()))?;
                }
            }
        }

        move_file(&source, &dest_dir.join(package))
    }
}

impl PackageSink for OutputCollector {
    fn collect(&self, dir: &Path, packages: &[String]) -> Result<()> {
        for package in packages {
            self.collect_one(dir, package)?;
        }
        Ok(())
    }
}

/// Move a file, replacing the destination; copies across filesystems
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    fs::copy(from, to).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to move {} to {}: {}", from.display(), to.display(), e),
        ))
    })?;
    fs::remove_file(from)?;
    Ok(())
}
