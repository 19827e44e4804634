//! Cache backend trait definition.

use super::{CacheEntry, CacheStats};
use crate::error::CacheError;
use std::time::SystemTime;

/// Trait for descriptor cache backends
pub trait CacheBackend: Send + Sync {
    /// Get a cached descriptor if it exists and is still valid
    ///
    /// The entry is only returned if the source hasn't changed since it
    /// was cached and was computed with the current descriptor version.
    fn get(
        &self,
        key: &str,
        current_size: u64,
        current_modified: SystemTime,
    ) -> Result<Option<CacheEntry>, CacheError>;

    /// Store a descriptor in the cache
    fn set(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Store multiple descriptors in the cache in a single transaction.
    fn set_batch(&self, entries: &[CacheEntry]) -> Result<(), CacheError> {
        for entry in entries {
            self.set(entry.clone())?;
        }
        Ok(())
    }

    /// Remove a specific entry
    fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Clear all cached entries
    fn clear(&self) -> Result<(), CacheError>;

    /// Get cache statistics
    fn stats(&self) -> Result<CacheStats, CacheError>;

    /// Remove path entries for files that no longer exist
    ///
    /// Content-digest entries are kept. Returns the number of entries removed.
    fn prune_orphans(&self) -> Result<usize, CacheError>;
}
