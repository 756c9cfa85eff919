/// Persistent partitioned record store for the offline cache
///
/// A store holds named partitions (e.g., "design-gallery-images-v1"),
/// each a key-value map from resource URL to a cached response.
/// Every operation is atomic at the record level; deleting a partition
/// removes it and its records in one transaction.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{CacheError, CacheRecord, CachedResponse};

/// The store contract consumed by the cache coordinator
pub trait CacheStore: Send + Sync {
    /// Create the partition if it doesn't exist yet
    fn open_partition(&self, name: &str) -> Result<(), CacheError>;

    /// Find the record stored for `key` in `partition`
    fn lookup(&self, partition: &str, key: &str) -> Result<Option<CacheRecord>, CacheError>;

    /// Insert or overwrite a record, creating the partition on demand
    fn put(&self, partition: &str, record: &CacheRecord) -> Result<(), CacheError>;

    /// Names of every partition currently in the store, sorted
    fn partition_names(&self) -> Result<Vec<String>, CacheError>;

    /// Delete a partition and all its records.
    /// Returns false if no such partition existed.
    fn delete_partition(&self, name: &str) -> Result<bool, CacheError>;
}

/// SQLite-backed store that survives process restarts
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at `db_path`
    pub fn open(db_path: &Path) -> Result<Self, CacheError> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        log::info!("📁 Cache database opened at: {}", db_path.display());

        let store = SqliteCacheStore {
            conn: Mutex::new(conn),
            db_path: Some(db_path.to_path_buf()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a throwaway store that lives only as long as the process
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let store = SqliteCacheStore {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Default location: the platform cache directory
    /// - Linux: ~/.cache/design-gallery/offline.db
    /// - macOS: ~/Library/Caches/design-gallery/offline.db
    /// - Windows: %LOCALAPPDATA%\design-gallery\offline.db
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::cache_dir().or_else(dirs::home_dir)?;
        path.push("design-gallery");
        path.push("offline.db");
        Some(path)
    }

    /// Path of the database file, None for in-memory stores
    #[cfg(test)]
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn init_schema(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS partitions (
                name            TEXT PRIMARY KEY,
                created_at      INTEGER NOT NULL
            )",
            [],
        )?;

        // One row per (partition, resource); overwritten on refresh
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                partition       TEXT NOT NULL,
                resource_key    TEXT NOT NULL,
                generation      TEXT NOT NULL,
                status          INTEGER NOT NULL,
                content_type    TEXT,
                body            BLOB NOT NULL,
                stored_at       INTEGER NOT NULL,
                PRIMARY KEY (partition, resource_key)
            )",
            [],
        )?;

        log::debug!("Cache schema initialized");
        Ok(())
    }
}

impl CacheStore for SqliteCacheStore {
    fn open_partition(&self, name: &str) -> Result<(), CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        conn.execute(
            "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
            params![name, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn lookup(&self, partition: &str, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let record = conn
            .query_row(
                "SELECT resource_key, generation, status, content_type, body, stored_at
                 FROM records
                 WHERE partition = ?1 AND resource_key = ?2",
                params![partition, key],
                |row| {
                    Ok(CacheRecord {
                        resource_key: row.get(0)?,
                        generation: row.get(1)?,
                        response: CachedResponse {
                            status: row.get(2)?,
                            content_type: row.get(3)?,
                            body: row.get(4)?,
                        },
                        stored_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn put(&self, partition: &str, record: &CacheRecord) -> Result<(), CacheError> {
        let mut conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
            params![partition, record.stored_at],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO records
                (partition, resource_key, generation, status, content_type, body, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                partition,
                &record.resource_key,
                &record.generation,
                record.response.status,
                &record.response.content_type,
                &record.response.body,
                record.stored_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn partition_names(&self) -> Result<Vec<String>, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn delete_partition(&self, name: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM records WHERE partition = ?1", params![name])?;
        let removed = tx.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
        tx.commit()?;
        Ok(removed > 0)
    }
}

impl std::fmt::Debug for SqliteCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCacheStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

/// Volatile store used when the database cannot be opened, and in tests
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    partitions: Mutex<BTreeMap<String, BTreeMap<String, CacheRecord>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn open_partition(&self, name: &str) -> Result<(), CacheError> {
        let mut partitions = self.partitions.lock().map_err(|_| CacheError::Poisoned)?;
        partitions.entry(name.to_string()).or_default();
        Ok(())
    }

    fn lookup(&self, partition: &str, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        let partitions = self.partitions.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(partitions
            .get(partition)
            .and_then(|records| records.get(key))
            .cloned())
    }

    fn put(&self, partition: &str, record: &CacheRecord) -> Result<(), CacheError> {
        let mut partitions = self.partitions.lock().map_err(|_| CacheError::Poisoned)?;
        partitions
            .entry(partition.to_string())
            .or_default()
            .insert(record.resource_key.clone(), record.clone());
        Ok(())
    }

    fn partition_names(&self) -> Result<Vec<String>, CacheError> {
        let partitions = self.partitions.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(partitions.keys().cloned().collect())
    }

    fn delete_partition(&self, name: &str) -> Result<bool, CacheError> {
        let mut partitions = self.partitions.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(partitions.remove(name).is_some())
    }
}
