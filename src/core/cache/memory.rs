//! In-memory cache backend for testing.

use super::{is_path_key, CacheBackend, CacheEntry, CacheStats};
use crate::error::CacheError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

/// In-memory cache backend
///
/// Useful for testing and scenarios where persistence isn't needed.
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    /// Create a new in-memory cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn poisoned() -> CacheError {
        CacheError::Corrupted {
            path: PathBuf::from("memory"),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryCache {
    fn get(
        &self,
        key: &str,
        current_size: u64,
        current_modified: SystemTime,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;

        Ok(entries
            .get(key)
            .filter(|entry| entry.is_valid_for(current_size, current_modified))
            .cloned())
    }

    fn set(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.clear();
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;

        Ok(CacheStats {
            total_entries: entries.len(),
            total_size_bytes: entries
                .values()
                .map(|e| (e.descriptor.len() * std::mem::size_of::<f64>()) as u64)
                .sum(),
            oldest_entry: entries.values().map(|e| e.cached_at).min(),
            newest_entry: entries.values().map(|e| e.cached_at).max(),
        })
    }

    fn prune_orphans(&self) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;

        let before = entries.len();
        entries.retain(|key, _| !is_path_key(key) || Path::new(key).exists());
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::Descriptor;

    fn create_entry(key: &str) -> CacheEntry {
        CacheEntry::new(key, Descriptor::new(vec![0.125; 8]), 1000, SystemTime::now())
    }

    #[test]
    fn cache_miss_returns_none() {
        let cache = InMemoryCache::new();
        let result = cache.get("/nonexistent.jpg", 1000, SystemTime::now()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn cache_hit_returns_entry() {
        let cache = InMemoryCache::new();
        let entry = create_entry("/corpus/3_1.jpg");
        let modified = entry.source_modified;

        cache.set(entry).unwrap();

        let result = cache.get("/corpus/3_1.jpg", 1000, modified).unwrap();
        assert_eq!(result.unwrap().descriptor.values(), &[0.125; 8]);
    }

    #[test]
    fn modified_file_invalidates_cache() {
        let cache = InMemoryCache::new();
        let entry = create_entry("/corpus/3_1.jpg");
        let later = entry.source_modified + std::time::Duration::from_secs(60);

        cache.set(entry).unwrap();

        assert!(cache.get("/corpus/3_1.jpg", 1000, later).unwrap().is_none());
    }

    #[test]
    fn stats_are_accurate() {
        let cache = InMemoryCache::new();
        cache.set(create_entry("/a.jpg")).unwrap();
        cache.set(create_entry("/b.jpg")).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.total_size_bytes, 128); // 8 values * 8 bytes * 2 entries
    }

    #[test]
    fn clear_and_remove() {
        let cache = InMemoryCache::new();
        cache.set(create_entry("/a.jpg")).unwrap();
        cache.set(create_entry("/b.jpg")).unwrap();

        cache.remove("/a.jpg").unwrap();
        assert_eq!(cache.stats().unwrap().total_entries, 1);

        cache.clear().unwrap();
        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn prune_keeps_digest_entries() {
        let cache = InMemoryCache::new();
        cache.set(create_entry("/nonexistent/gone.jpg")).unwrap();
        cache.set(create_entry("xxh3:0123456789abcdef")).unwrap();

        assert_eq!(cache.prune_orphans().unwrap(), 1);
        assert_eq!(cache.stats().unwrap().total_entries, 1);
    }
}
