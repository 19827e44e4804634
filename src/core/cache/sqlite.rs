//! SQLite cache backend for persistent storage.

use super::{is_path_key, CacheBackend, CacheEntry, CacheStats};
use crate::core::descriptor::Descriptor;
use crate::error::CacheError;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// SQLite-backed persistent descriptor cache
///
/// Uses WAL (Write-Ahead Logging) mode so readers can proceed while
/// a batch is being written.
pub struct SqliteCache {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteCache {
    /// Open or create a cache database at the given path
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| CacheError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS descriptors (
                key TEXT PRIMARY KEY,
                descriptor BLOB NOT NULL,
                version INTEGER NOT NULL,
                source_size INTEGER NOT NULL,
                source_modified INTEGER NOT NULL,
                cached_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    /// Open the cache and drop entries whose files have disappeared
    pub fn open_with_prune(path: &Path) -> Result<Self, CacheError> {
        let cache = Self::open(path)?;
        let removed = cache.prune_orphans()?;
        if removed > 0 {
            tracing::debug!(removed, path = %path.display(), "pruned orphaned descriptor entries");
        }
        Ok(cache)
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    /// Convert SystemTime to Unix timestamp
    fn to_timestamp(time: SystemTime) -> i64 {
        time.duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs() as i64
    }

    /// Convert Unix timestamp to SystemTime
    fn from_timestamp(timestamp: i64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(timestamp.max(0) as u64)
    }

    fn insert(conn: &Connection, entry: &CacheEntry) -> Result<(), CacheError> {
        conn.execute(
            "INSERT OR REPLACE INTO descriptors
             (key, descriptor, version, source_size, source_modified, cached_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                entry.key,
                entry.descriptor.to_le_bytes(),
                entry.version,
                entry.source_size as i64,
                Self::to_timestamp(entry.source_modified),
                Self::to_timestamp(entry.cached_at),
            ],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(())
    }
}

impl CacheBackend for SqliteCache {
    fn get(
        &self,
        key: &str,
        current_size: u64,
        current_modified: SystemTime,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let conn = self.lock()?;

        let row = conn.query_row(
            "SELECT descriptor, version, source_size, source_modified, cached_at
             FROM descriptors WHERE key = ?",
            [key],
            |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            },
        );

        let (blob, version, size, modified, cached_at) = match row {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(CacheError::QueryFailed(e.to_string())),
        };

        let descriptor =
            Descriptor::from_le_bytes(&blob).ok_or_else(|| CacheError::InvalidDescriptor {
                key: key.to_string(),
                reason: format!("{} bytes is not a whole number of values", blob.len()),
            })?;

        let entry = CacheEntry {
            key: key.to_string(),
            descriptor,
            version,
            source_size: size as u64,
            source_modified: Self::from_timestamp(modified),
            cached_at: Self::from_timestamp(cached_at),
        };

        if entry.is_valid_for(current_size, current_modified) {
            Ok(Some(entry))
        } else {
            Ok(None)
        }
    }

    fn set(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let conn = self.lock()?;
        Self::insert(&conn, &entry)
    }

    fn set_batch(&self, entries: &[CacheEntry]) -> Result<(), CacheError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        for entry in entries {
            Self::insert(&tx, entry)?;
        }

        tx.commit()
            .map_err(|e| CacheError::QueryFailed(e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM descriptors WHERE key = ?", [key])
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM descriptors", [])
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let conn = self.lock()?;

        let (total_entries, total_size_bytes, oldest, newest) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(LENGTH(descriptor)), 0), MIN(cached_at), MAX(cached_at)
                 FROM descriptors",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                    ))
                },
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(CacheStats {
            total_entries: total_entries as usize,
            total_size_bytes: total_size_bytes as u64,
            oldest_entry: oldest.map(Self::from_timestamp),
            newest_entry: newest.map(Self::from_timestamp),
        })
    }

    fn prune_orphans(&self) -> Result<usize, CacheError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT key FROM descriptors")
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let keys: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();

        drop(stmt);

        let mut count = 0;
        for key in keys {
            if is_path_key(&key) && !Path::new(&key).exists() {
                conn.execute("DELETE FROM descriptors WHERE key = ?", [&key])
                    .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
                count += 1;
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::{DESCRIPTOR_LEN, DESCRIPTOR_VERSION};
    use tempfile::TempDir;

    /// Modification time truncated to whole seconds, as SQLite stores it
    fn whole_seconds_now() -> SystemTime {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn create_entry(key: &str, modified: SystemTime) -> CacheEntry {
        let values = (0..DESCRIPTOR_LEN).map(|i| i as f64 / 1000.0).collect();
        CacheEntry::new(key, Descriptor::new(values), 1000, modified)
    }

    #[test]
    fn sqlite_cache_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("descriptors.db");

        let cache = SqliteCache::open(&db_path).unwrap();

        assert!(db_path.exists());
        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn sqlite_cache_stores_and_retrieves_exact_values() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("descriptors.db")).unwrap();
        let modified = whole_seconds_now();
        let entry = create_entry("/corpus/5_thumbnail.jpg", modified);
        let expected = entry.descriptor.clone();

        cache.set(entry).unwrap();

        let result = cache.get("/corpus/5_thumbnail.jpg", 1000, modified).unwrap().unwrap();
        assert_eq!(result.descriptor, expected);
        assert_eq!(result.version, DESCRIPTOR_VERSION);
    }

    #[test]
    fn sqlite_cache_invalidates_on_modification() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("descriptors.db")).unwrap();
        let modified = whole_seconds_now();

        cache.set(create_entry("/corpus/5_1.jpg", modified)).unwrap();

        let later = modified + Duration::from_secs(60);
        assert!(cache.get("/corpus/5_1.jpg", 1000, later).unwrap().is_none());
    }

    #[test]
    fn sqlite_cache_batch_insert() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("descriptors.db")).unwrap();
        let modified = whole_seconds_now();

        let entries: Vec<_> = (0..5)
            .map(|i| create_entry(&format!("/corpus/{}_1.jpg", i), modified))
            .collect();
        cache.set_batch(&entries).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 5);
        assert_eq!(stats.total_size_bytes, 5 * DESCRIPTOR_LEN as u64 * 8);
    }

    #[test]
    fn sqlite_cache_clears_all() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("descriptors.db")).unwrap();
        let modified = whole_seconds_now();

        cache.set(create_entry("/a.jpg", modified)).unwrap();
        cache.set(create_entry("/b.jpg", modified)).unwrap();
        cache.clear().unwrap();

        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn sqlite_cache_prunes_missing_files_only() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("descriptors.db")).unwrap();
        let modified = whole_seconds_now();
        let existing = temp_dir.path().join("present.jpg");
        std::fs::write(&existing, b"x").unwrap();

        cache.set(create_entry(&existing.display().to_string(), modified)).unwrap();
        cache.set(create_entry("/nonexistent/gone.jpg", modified)).unwrap();
        cache.set(create_entry("xxh3:00000000cafebabe", modified)).unwrap();

        assert_eq!(cache.prune_orphans().unwrap(), 1);
        assert_eq!(cache.stats().unwrap().total_entries, 2);
    }

    #[test]
    fn sqlite_cache_prunes_when_reopened() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("descriptors.db");
        let modified = whole_seconds_now();

        {
            let cache = SqliteCache::open(&db_path).unwrap();
            cache.set(create_entry("/nonexistent/removed.jpg", modified)).unwrap();
            cache.set(create_entry("xxh3:00000000feedface", modified)).unwrap();
        }

        let cache = SqliteCache::open_with_prune(&db_path).unwrap();

        assert_eq!(cache.path(), db_path.as_path());
        assert_eq!(cache.stats().unwrap().total_entries, 1);
        assert!(cache.get("xxh3:00000000feedface", 1000, modified).unwrap().is_some());
    }
}
