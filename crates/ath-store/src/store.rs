use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, StoreError};
use crate::schema;

/// One origin's key/value storage.
pub struct Store {
    conn: Connection,
    quota_bytes: Option<usize>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn,
            quota_bytes: None,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn,
            quota_bytes: None,
        })
    }

    /// Cap the total bytes of keys plus values, like a browser origin quota.
    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).optional()?;
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Items ---

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM storage WHERE key = ?1")?;
        let value = stmt.query_row([key], |row| row.get(0)).optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(quota) = self.quota_bytes {
            let used = self.used_bytes_without(key)? + key.len() + value.len();
            if used > quota {
                return Err(StoreError::QuotaExceeded { used, quota });
            }
        }
        self.conn.execute(
            "INSERT INTO storage (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// Returns whether a row was deleted.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM storage WHERE key = ?1", [key])?;
        Ok(n > 0)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM storage ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(keys)
    }

    pub fn used_bytes(&self) -> Result<usize> {
        self.used_bytes_without("")
    }

    fn used_bytes_without(&self, key: &str) -> Result<usize> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(length(CAST(key AS BLOB)) + length(CAST(value AS BLOB))), 0)
             FROM storage WHERE key != ?1",
            [key],
            |row| row.get(0),
        )?;
        usize::try_from(used).map_err(|_| StoreError::InvalidData(format!("negative size {used}")))
    }
}

impl ath_core::Storage for Store {
    fn get_item(&self, key: &str) -> std::result::Result<Option<String>, ath_core::StorageError> {
        Ok(self.get(key)?)
    }

    fn set_item(&mut self, key: &str, value: &str) -> std::result::Result<(), ath_core::StorageError> {
        Ok(self.set(key, value)?)
    }

    fn remove_item(&mut self, key: &str) -> std::result::Result<(), ath_core::StorageError> {
        self.remove(key)?;
        Ok(())
    }
}
