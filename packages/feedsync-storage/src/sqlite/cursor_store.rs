//! SQLite Cursor Store
//!
//! One row per `(partition_key, row_key)` holding the last consumed
//! change-feed position. Several deployments can share one database file by
//! using different keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use feedsync_core::domain::Cursor;
use feedsync_core::ports::{CursorStore, PortResult};

use crate::error::{Result, StorageError};

/// Stored cursor row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorRow {
    pub cursor: Cursor,
    /// Incremented on every write, starting at 1
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// SQLite-backed CursorStore implementation
#[derive(Clone)]
pub struct SqliteCursorStore {
    conn: Arc<Mutex<Connection>>,
    partition_key: String,
    row_key: String,
}

impl SqliteCursorStore {
    /// Open (or create) the database at `db_path`.
    pub fn open(
        db_path: impl AsRef<Path>,
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
    ) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn, partition_key.into(), row_key.into())
    }

    /// In-memory database (for testing)
    pub fn in_memory(partition_key: impl Into<String>, row_key: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, partition_key.into(), row_key.into())
    }

    fn with_connection(conn: Connection, partition_key: String, row_key: String) -> Result<Self> {
        if partition_key.is_empty() || row_key.is_empty() {
            return Err(StorageError::config(
                "partition_key and row_key must be non-empty",
            ));
        }
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            partition_key,
            row_key,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cursors (
                partition_key TEXT NOT NULL,
                row_key TEXT NOT NULL,
                token TEXT NOT NULL,
                version INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (partition_key, row_key)
            )",
            [],
        )?;
        Ok(())
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn row_key(&self) -> &str {
        &self.row_key
    }

    /// Full stored row including bookkeeping columns.
    pub fn read_row(&self) -> Result<Option<CursorRow>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT token, version, updated_at FROM cursors
                 WHERE partition_key = ?1 AND row_key = ?2",
                params![&self.partition_key, &self.row_key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((token, version, updated_at)) = raw else {
            return Ok(None);
        };
        let version = u64::try_from(version)
            .map_err(|_| StorageError::corrupt(format!("negative cursor version {}", version)))?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| {
                StorageError::corrupt(format!("bad updated_at '{}'", updated_at)).with_source(e)
            })?
            .with_timezone(&Utc);

        Ok(Some(CursorRow {
            cursor: Cursor::new(token),
            version,
            updated_at,
        }))
    }

    /// Insert or overwrite the row.
    pub fn write(&self, cursor: &Cursor) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO cursors (partition_key, row_key, token, version, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT (partition_key, row_key)
             DO UPDATE SET token = excluded.token,
                           version = cursors.version + 1,
                           updated_at = excluded.updated_at",
            params![
                &self.partition_key,
                &self.row_key,
                cursor.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?;
        debug!(
            "Cursor {}/{} set to {}",
            self.partition_key, self.row_key, cursor
        );
        Ok(())
    }

    /// Conditional write in a single statement; `false` when the row moved.
    pub fn swap(&self, expected: Option<&Cursor>, next: &Cursor) -> Result<bool> {
        let conn = self.conn.lock();
        let now = Utc::now().to_rfc3339();
        let changed = match expected {
            None => conn.execute(
                "INSERT INTO cursors (partition_key, row_key, token, version, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4)
                 ON CONFLICT (partition_key, row_key) DO NOTHING",
                params![&self.partition_key, &self.row_key, next.as_str(), now],
            )?,
            Some(expected) => conn.execute(
                "UPDATE cursors
                 SET token = ?3, version = version + 1, updated_at = ?4
                 WHERE partition_key = ?1 AND row_key = ?2 AND token = ?5",
                params![
                    &self.partition_key,
                    &self.row_key,
                    next.as_str(),
                    now,
                    expected.as_str()
                ],
            )?,
        };

        if changed == 0 {
            warn!(
                "Cursor {}/{} no longer at {}; not advancing to {}",
                self.partition_key,
                self.row_key,
                expected.map(Cursor::as_str).unwrap_or("<none>"),
                next
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Delete the row so the next pass bootstraps again.
    pub fn clear(&self) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM cursors WHERE partition_key = ?1 AND row_key = ?2",
            params![&self.partition_key, &self.row_key],
        )?;
        Ok(deleted > 0)
    }
}

impl SqliteCursorStore {
    /// Run a row operation on the blocking pool against a clone of this store.
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&SqliteCursorStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| {
                StorageError::database(format!("cursor task did not complete: {}", e)).with_source(e)
            })?
    }
}

#[async_trait]
impl CursorStore for SqliteCursorStore {
    async fn get(&self) -> PortResult<Option<Cursor>> {
        let row = self.blocking(|store| store.read_row()).await?;
        Ok(row.map(|row| row.cursor))
    }

    async fn put(&self, cursor: &Cursor) -> PortResult<()> {
        let cursor = cursor.clone();
        Ok(self.blocking(move |store| store.write(&cursor)).await?)
    }

    async fn compare_and_put(&self, expected: Option<&Cursor>, next: &Cursor) -> PortResult<bool> {
        let expected = expected.cloned();
        let next = next.clone();
        Ok(self
            .blocking(move |store| store.swap(expected.as_ref(), &next))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn store() -> SqliteCursorStore {
        SqliteCursorStore::in_memory("search-index", "continuation-token").unwrap()
    }

    #[test]
    fn test_empty_store_has_no_row() {
        assert_eq!(store().read_row().unwrap(), None);
    }

    #[test]
    fn test_write_bumps_version() {
        let s = store();
        s.write(&Cursor::new("c1")).unwrap();
        s.write(&Cursor::new("c2")).unwrap();

        let row = s.read_row().unwrap().unwrap();
        assert_eq!(row.cursor, Cursor::new("c2"));
        assert_eq!(row.version, 2);
    }

    #[test]
    fn test_swap_from_absent() {
        let s = store();
        assert!(s.swap(None, &Cursor::new("c0")).unwrap());
        assert!(!s.swap(None, &Cursor::new("c1")).unwrap());
        assert_eq!(s.read_row().unwrap().unwrap().cursor, Cursor::new("c0"));
    }

    #[test]
    fn test_swap_requires_expected_token() {
        let s = store();
        s.write(&Cursor::new("c1")).unwrap();

        assert!(!s.swap(Some(&Cursor::new("c0")), &Cursor::new("c2")).unwrap());
        assert!(s.swap(Some(&Cursor::new("c1")), &Cursor::new("c2")).unwrap());

        let row = s.read_row().unwrap().unwrap();
        assert_eq!(row.cursor, Cursor::new("c2"));
        assert_eq!(row.version, 2);
    }

    #[test]
    fn test_swap_against_missing_row_fails() {
        let s = store();
        assert!(!s.swap(Some(&Cursor::new("c1")), &Cursor::new("c2")).unwrap());
        assert_eq!(s.read_row().unwrap(), None);
    }

    #[test]
    fn test_clear() {
        let s = store();
        s.write(&Cursor::new("c1")).unwrap();
        assert!(s.clear().unwrap());
        assert!(!s.clear().unwrap());
        assert_eq!(s.read_row().unwrap(), None);
    }

    #[test]
    fn test_empty_keys_rejected() {
        let err = SqliteCursorStore::in_memory("", "row").err().unwrap();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn test_corrupt_timestamp_is_an_error() {
        let s = store();
        s.write(&Cursor::new("c1")).unwrap();
        s.conn
            .lock()
            .execute("UPDATE cursors SET updated_at = 'yesterday'", [])
            .unwrap();

        let err = s.read_row().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Corrupt);
    }
}
