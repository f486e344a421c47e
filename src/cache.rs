// src/cache.rs

//! Dependency cache
//!
//! Maps the content hash of a requirements file to the package archives it
//! resolved to last time. Keys are content based: editing a file changes its
//! key, renaming it does not.
//!
//! Entries can also be dropped by distribution name. The cache has no index
//! from names to entries, so this scans every entry.

use crate::db::{self, models::CacheEntry, models::CacheRow};
use crate::error::{Error, Result};
use crate::packages::identity;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Database file name inside the cache root
pub const CACHE_DB_NAME: &str = "cache.db";

/// Hash of a requirements file's raw bytes (hex encoded SHA-256)
pub fn content_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Persistent dependency cache backed by SQLite
pub struct DependencyCache {
    conn: Connection,
    db_path: PathBuf,
}

impl DependencyCache {
    /// Open the cache stored in `root`, creating it if needed
    pub fn open(root: &Path) -> Result<Self> {
        let db_path = root.join(CACHE_DB_NAME);
        db::init(&db_path)?;
        let conn = db::open(&db_path)?;
        Ok(Self { conn, db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Cached packages for `hash`
    ///
    /// Never fails: unreadable or malformed entries count as misses.
    pub fn lookup(&self, hash: &str) -> Option<Vec<String>> {
        match self.entry(hash) {
            Ok(entry) => entry.map(|e| e.packages),
            Err(e) => {
                warn!("Ignoring cache entry {}: {}", hash, e);
                None
            }
        }
    }

    /// Full entry for `hash`; malformed records surface as `CacheCorruption`
    pub fn entry(&self, hash: &str) -> Result<Option<CacheEntry>> {
        let Some(row) = CacheRow::find_by_hash(&self.conn, hash)? else {
            return Ok(None);
        };
        row.decode().map(Some).map_err(|e| Error::CacheCorruption {
            hash: hash.to_string(),
            reason: e.to_string(),
        })
    }

    /// Store `packages` under `hash`, replacing any previous entry
    pub fn store(&self, hash: &str, packages: &[String]) -> Result<()> {
        CacheEntry::new(hash.to_string(), packages.to_vec()).upsert(&self.conn)?;
        debug!("Cached {} packages under {}", packages.len(), hash);
        Ok(())
    }

    /// Delete every entry containing a distribution named `canonical_name`
    ///
    /// Returns the number of deleted entries. Entries that cannot be decoded
    /// are left alone, they already read as misses.
    pub fn invalidate_by_name(&mut self, canonical_name: &str) -> Result<usize> {
        db::transaction(&mut self.conn, |tx| {
            let mut deleted = 0;
            for row in CacheRow::list_all(tx)? {
                let hash = row.hash.clone();
                let Ok(entry) = row.decode() else {
                    continue;
                };
                let mentions_name = entry.packages.iter().any(|package| {
                    identity::resolve(package).is_ok_and(|d| d.name == canonical_name)
                });
                if mentions_name {
                    CacheEntry::delete(tx, &hash)?;
                    deleted += 1;
                }
            }
            Ok(deleted)
        })
        .inspect(|deleted| {
            debug!("Invalidated {} cache entries for {}", deleted, canonical_name);
        })
    }
}
