//! # Cache Module
//!
//! Persists image descriptors to avoid recomputation.
//!
//! ## Benefits
//! - Existing artifacts are not re-decoded on every bulk load
//! - Only new or modified images need describing
//! - Cache invalidation based on file size, modification time and
//!   descriptor version
//!
//! ## Backends
//! - `SqliteCache` - Persistent storage using SQLite
//! - `InMemoryCache` - For testing and one-off runs

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryCache;
pub use sqlite::SqliteCache;
pub use traits::CacheBackend;

use crate::core::descriptor::{Descriptor, DESCRIPTOR_VERSION};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A cached descriptor entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Source key (file path or content digest)
    pub key: String,
    /// The computed descriptor
    pub descriptor: Descriptor,
    /// Descriptor layout version at time of computing
    pub version: u32,
    /// Source size at time of describing
    pub source_size: u64,
    /// Source modification time at time of describing
    pub source_modified: SystemTime,
    /// When the entry was cached
    pub cached_at: SystemTime,
}

impl CacheEntry {
    /// Create an entry for the current descriptor version
    pub fn new(
        key: impl Into<String>,
        descriptor: Descriptor,
        source_size: u64,
        source_modified: SystemTime,
    ) -> Self {
        Self {
            key: key.into(),
            descriptor,
            version: DESCRIPTOR_VERSION,
            source_size,
            source_modified,
            cached_at: SystemTime::now(),
        }
    }

    /// Check if this entry is still valid for a source
    pub fn is_valid_for(&self, source_size: u64, source_modified: SystemTime) -> bool {
        // Compare timestamps at second precision (SQLite stores seconds)
        let cached_secs = self
            .source_modified
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let current_secs = source_modified
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.version == DESCRIPTOR_VERSION
            && self.source_size == source_size
            && cached_secs == current_secs
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of entries
    pub total_entries: usize,
    /// Total size of cached descriptor data in bytes
    pub total_size_bytes: u64,
    /// Oldest entry timestamp
    pub oldest_entry: Option<SystemTime>,
    /// Newest entry timestamp
    pub newest_entry: Option<SystemTime>,
}

/// Whether a cache key refers to a file on disk (and can be orphaned)
pub(crate) fn is_path_key(key: &str) -> bool {
    !key.starts_with("xxh3:")
}
