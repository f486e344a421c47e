// src/db/models.rs

//! Data models for cache database entities

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Raw cache row: package list as stored, not yet decoded
#[derive(Debug, Clone)]
pub struct CacheRow {
    pub hash: String,
    pub packages: String,
    pub created_at: Option<String>,
}

/// Resolved packages of one requirements file, keyed by its content hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub hash: String,
    pub packages: Vec<String>,
    pub created_at: Option<String>,
}

impl CacheEntry {
    pub fn new(hash: String, packages: Vec<String>) -> Self {
        Self {
            hash,
            packages,
            created_at: None,
        }
    }

    /// Insert or replace this entry in a single statement
    pub fn upsert(&self, conn: &Connection) -> Result<()> {
        let packages = serde_json::to_string(&self.packages)?;
        conn.execute(
            "INSERT OR REPLACE INTO dependency_cache (hash, packages) VALUES (?1, ?2)",
            params![&self.hash, packages],
        )?;
        Ok(())
    }

    /// Delete an entry by hash
    pub fn delete(conn: &Connection, hash: &str) -> Result<()> {
        conn.execute("DELETE FROM dependency_cache WHERE hash = ?1", [hash])?;
        Ok(())
    }
}

impl CacheRow {
    pub fn find_by_hash(conn: &Connection, hash: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT hash, packages, created_at FROM dependency_cache WHERE hash = ?1",
        )?;

        let row = stmt.query_row([hash], Self::from_row).optional()?;

        Ok(row)
    }

    /// List all rows, ordered by hash
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT hash, packages, created_at FROM dependency_cache ORDER BY hash",
        )?;

        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Decode the stored JSON package list
    pub fn decode(self) -> Result<CacheEntry> {
        let packages: Vec<String> = serde_json::from_str(&self.packages)?;
        Ok(CacheEntry {
            hash: self.hash,
            packages,
            created_at: self.created_at,
        })
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            hash: row.get(0)?,
            packages: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }

    fn find(conn: &Connection, hash: &str) -> Option<CacheEntry> {
        CacheRow::find_by_hash(conn, hash)
            .unwrap()
            .map(|row| row.decode().unwrap())
    }

    #[test]
    fn test_upsert_and_find() {
        let conn = create_test_db();

        let entry = CacheEntry::new(
            "abc".to_string(),
            vec!["foo-1.0.tar.gz".to_string(), "bar-0.1.zip".to_string()],
        );
        entry.upsert(&conn).unwrap();

        let found = find(&conn, "abc").unwrap();
        assert_eq!(found.packages, entry.packages);
        assert!(found.created_at.is_some());

        // Overwrite keeps a single row
        CacheEntry::new("abc".to_string(), vec![]).upsert(&conn).unwrap();
        let found = find(&conn, "abc").unwrap();
        assert!(found.packages.is_empty());
        assert_eq!(CacheRow::list_all(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_delete() {
        let conn = create_test_db();
        CacheEntry::new("abc".to_string(), vec![]).upsert(&conn).unwrap();
        CacheEntry::delete(&conn, "abc").unwrap();
        assert!(find(&conn, "abc").is_none());
    }

    #[test]
    fn test_malformed_row_fails_to_decode() {
        let conn = create_test_db();
        conn.execute(
            "INSERT INTO dependency_cache (hash, packages) VALUES ('bad', 'not json')",
            [],
        )
        .unwrap();

        let row = CacheRow::find_by_hash(&conn, "bad").unwrap().unwrap();
        assert!(row.decode().is_err());
    }
}
