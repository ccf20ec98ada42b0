//! Key-value storage for the tiny grid derivatives.
//!
//! MONTH_TINY and YEAR_TINY are small enough that one file each per asset
//! would dominate the directory tree, so they live in a key-value store
//! instead. The capability is optional: a service built without one simply
//! skips the tiny kinds.
//!
//! Keys are the 13-digit capture time followed by the 10-digit asset id, so
//! lexical order within a kind is capture-time order.

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::info;

use crate::derivative::{AssetId, DerivativeKind, StorageMedium};

/// Errors from a key-value backend.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("{0} is not stored in the key-value store")]
    NotKeyValue(DerivativeKind),

    #[error("key-value database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to open key-value database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
}

/// Build the key of a tiny derivative.
///
/// ```
/// use mediathumb::store::tiny_key;
///
/// assert_eq!(tiny_key(1_700_000_000_123, 42), "17000000001230000000042");
/// ```
pub fn tiny_key(capture_time: i64, asset_id: AssetId) -> String {
    format!("{:013}{:010}", capture_time, asset_id)
}

/// Storage for the tiny derivative kinds.
pub trait KvStore: Send + Sync {
    fn get(&self, kind: DerivativeKind, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    fn put(&self, kind: DerivativeKind, key: &str, value: &[u8]) -> Result<(), KvError>;

    /// Remove an entry. Returns `false` if it was absent.
    fn delete(&self, kind: DerivativeKind, key: &str) -> Result<bool, KvError>;

    /// Number of entries stored for `kind`.
    fn len(&self, kind: DerivativeKind) -> Result<usize, KvError>;

    fn is_empty(&self, kind: DerivativeKind) -> Result<bool, KvError> {
        Ok(self.len(kind)? == 0)
    }
}

fn check_kind(kind: DerivativeKind) -> Result<(), KvError> {
    if kind.storage() != StorageMedium::KeyValue {
        return Err(KvError::NotKeyValue(kind));
    }
    Ok(())
}

/// In-memory store, for tests and ephemeral services.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<(DerivativeKind, String), Vec<u8>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, kind: DerivativeKind, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        check_kind(kind)?;
        Ok(self
            .entries
            .get(&(kind, key.to_string()))
            .map(|v| v.value().clone()))
    }

    fn put(&self, kind: DerivativeKind, key: &str, value: &[u8]) -> Result<(), KvError> {
        check_kind(kind)?;
        self.entries.insert((kind, key.to_string()), value.to_vec());
        Ok(())
    }

    fn delete(&self, kind: DerivativeKind, key: &str) -> Result<bool, KvError> {
        check_kind(kind)?;
        Ok(self.entries.remove(&(kind, key.to_string())).is_some())
    }

    fn len(&self, kind: DerivativeKind) -> Result<usize, KvError> {
        check_kind(kind)?;
        Ok(self.entries.iter().filter(|e| e.key().0 == kind).count())
    }
}

/// SQLite-backed store: one table, keyed by (kind suffix, key).
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    pub fn open(path: &Path) -> Result<Self, KvError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path).map_err(|source| KvError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        let store = Self::with_connection(conn)?;
        info!(path = %path.display(), "Opened tiny derivative store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, KvError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Set the page cache of this connection, in bytes.
    pub fn set_cache_size(&self, bytes: usize) -> Result<(), KvError> {
        let conn = self.conn.lock();
        conn.execute_batch(&crate::metadata::cache_size_pragma(bytes))?;
        Ok(())
    }

    fn with_connection(conn: Connection) -> Result<Self, KvError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tiny_derivatives (
                kind TEXT NOT NULL,
                key TEXT NOT NULL,
                data BLOB NOT NULL,
                PRIMARY KEY (kind, key)
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, kind: DerivativeKind, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        check_kind(kind)?;
        let conn = self.conn.lock();
        let data = conn
            .query_row(
                "SELECT data FROM tiny_derivatives WHERE kind = ?1 AND key = ?2",
                params![kind.suffix(), key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(data)
    }

    fn put(&self, kind: DerivativeKind, key: &str, value: &[u8]) -> Result<(), KvError> {
        check_kind(kind)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO tiny_derivatives (kind, key, data) VALUES (?1, ?2, ?3)",
            params![kind.suffix(), key, value],
        )?;
        Ok(())
    }

    fn delete(&self, kind: DerivativeKind, key: &str) -> Result<bool, KvError> {
        check_kind(kind)?;
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM tiny_derivatives WHERE kind = ?1 AND key = ?2",
            params![kind.suffix(), key],
        )?;
        Ok(removed > 0)
    }

    fn len(&self, kind: DerivativeKind) -> Result<usize, KvError> {
        check_kind(kind)?;
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tiny_derivatives WHERE kind = ?1",
            params![kind.suffix()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
