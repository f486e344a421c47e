// src/packages/archive.rs

//! Source archive reader
//!
//! Supports the sdist formats pip downloads: gzip or xz compressed tarballs,
//! plain tarballs and zip files.

use crate::error::{Error, Result};
use crate::packages::traits::ArchiveIntrospector;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::debug;
use xz2::read::XzDecoder;
use zip::ZipArchive;

/// Archive container and compression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGzip,
    TarXz,
    Tar,
    Zip,
}

impl ArchiveFormat {
    /// Detect the archive format from the file extension
    pub fn detect(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(Self::TarGzip)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Ok(Self::TarXz)
        } else if name.ends_with(".tar") {
            Ok(Self::Tar)
        } else if name.ends_with(".zip") {
            Ok(Self::Zip)
        } else {
            Err(Error::Archive(format!(
                "{}: unknown archive format",
                path.display()
            )))
        }
    }
}

/// A source distribution archive on disk
#[derive(Debug, Clone)]
pub struct SourceArchive {
    path: PathBuf,
    format: ArchiveFormat,
}

impl SourceArchive {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = ArchiveFormat::detect(&path)?;
        Ok(Self { path, format })
    }

    fn open_file(&self) -> Result<File> {
        File::open(&self.path).map_err(|e| {
            Error::Archive(format!("Failed to open {}: {}", self.path.display(), e))
        })
    }

    /// Open the tarball with the matching decompressor
    fn open_tar(&self) -> Result<Archive<Box<dyn Read>>> {
        let file = self.open_file()?;
        let reader: Box<dyn Read> = match self.format {
            ArchiveFormat::TarGzip => Box::new(GzDecoder::new(file)),
            ArchiveFormat::TarXz => Box::new(XzDecoder::new(file)),
            ArchiveFormat::Tar => Box::new(file),
            ArchiveFormat::Zip => {
                return Err(Error::Archive(format!(
                    "{} is not a tarball",
                    self.path.display()
                )));
            }
        };
        Ok(Archive::new(reader))
    }

    fn open_zip(&self) -> Result<ZipArchive<File>> {
        ZipArchive::new(self.open_file()?).map_err(|e| {
            Error::Archive(format!("Invalid zip archive {}: {}", self.path.display(), e))
        })
    }

    /// Directory every member lives under, relative to the extraction root
    ///
    /// Sdists normally wrap their content in a single `name-version/`
    /// directory; an empty path is returned when they don't.
    pub fn common_root(&self) -> Result<PathBuf> {
        Ok(common_prefix(&self.list_members()?))
    }
}

impl ArchiveIntrospector for SourceArchive {
    fn list_members(&self) -> Result<Vec<String>> {
        let mut members = Vec::new();

        if self.format == ArchiveFormat::Zip {
            let zip = self.open_zip()?;
            members.extend(zip.file_names().map(|n| n.to_string()));
        } else {
            let mut archive = self.open_tar()?;
            for entry in archive
                .entries()
                .map_err(|e| Error::Archive(format!("Failed to read archive entries: {}", e)))?
            {
                let entry = entry
                    .map_err(|e| Error::Archive(format!("Failed to read archive entry: {}", e)))?;
                let entry_path = entry
                    .path()
                    .map_err(|e| Error::Archive(format!("Failed to get entry path: {}", e)))?
                    .to_string_lossy()
                    .to_string();
                members.push(entry_path);
            }
        }

        debug!("{} members in {}", members.len(), self.path.display());
        Ok(members)
    }

    fn extract_all(&self, dest: &Path) -> Result<()> {
        debug!("Extracting {} to {}", self.path.display(), dest.display());
        fs::create_dir_all(dest)?;

        if self.format != ArchiveFormat::Zip {
            let mut archive = self.open_tar()?;
            for entry in archive
                .entries()
                .map_err(|e| Error::Archive(format!("Failed to read archive entries: {}", e)))?
            {
                let mut entry = entry
                    .map_err(|e| Error::Archive(format!("Failed to read archive entry: {}", e)))?;
                let entry_path = entry
                    .path()
                    .map_err(|e| Error::Archive(format!("Failed to get entry path: {}", e)))?
                    .into_owned();
                safe_relative_path(&entry_path)?;
                // unpack_in refuses paths escaping dest on its own as well
                entry.unpack_in(dest).map_err(|e| {
                    Error::Archive(format!("Failed to unpack {}: {}", entry_path.display(), e))
                })?;
            }
            return Ok(());
        }

        let mut zip = self.open_zip()?;
        for i in 0..zip.len() {
            let mut file = zip
                .by_index(i)
                .map_err(|e| Error::Archive(format!("Failed to read zip entry: {}", e)))?;
            let relative = safe_relative_path(Path::new(file.name()))?;
            if relative.as_os_str().is_empty() {
                continue;
            }

            let out = dest.join(relative);
            if file.is_dir() {
                fs::create_dir_all(&out)?;
                continue;
            }
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut writer = File::create(&out)?;
            io::copy(&mut file, &mut writer)?;
        }

        Ok(())
    }
}

/// Reject absolute paths and `..` components in archive members
fn safe_relative_path(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => out.push(segment),
            Component::CurDir => {}
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                return Err(Error::Archive(format!(
                    "Unsafe path in archive member: {}",
                    path.display()
                )));
            }
        }
    }
    Ok(out)
}

/// Longest leading run of whole path components shared by all members
pub fn common_prefix(members: &[String]) -> PathBuf {
    let mut prefix: Option<Vec<&str>> = None;

    for member in members {
        let parts: Vec<&str> = member
            .split('/')
            .filter(|p| !p.is_empty() && *p != ".")
            .collect();
        match &mut prefix {
            None => prefix = Some(parts),
            Some(shared) => {
                let keep = shared
                    .iter()
                    .zip(&parts)
                    .take_while(|(a, b)| a == b)
                    .count();
                shared.truncate(keep);
            }
        }
    }

    prefix.unwrap_or_default().into_iter().collect()
}
