//! Cache Entry Module
//!
//! Defines the generic entry container shared by every tier.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A cached value with its metadata.
///
/// Only `hit_count`, `last_accessed` and `access_seq` change after creation;
/// replacing the value always creates a new entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The stored value
    pub data: T,
    /// Creation timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Time to live in milliseconds, always > 0
    pub ttl: u64,
    /// Uncompressed byte length of the canonical encoding
    pub size: usize,
    /// Number of reads served from this entry
    pub hit_count: u64,
    /// Last read or write (Unix milliseconds)
    pub last_accessed: u64,
    /// Coarse classification used for invalidation
    pub query_pattern: String,
    /// Patterns invalidated when this entry's data changes
    pub dependencies: Vec<String>,
    /// Write generation of the key when this entry was stored
    #[serde(default)]
    pub generation: u64,
    /// Tie-breaker for accesses within the same millisecond
    #[serde(default)]
    pub access_seq: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a fresh entry stamped with the current time.
    ///
    /// A zero TTL is bumped to one millisecond.
    pub fn new(
        data: T,
        size: usize,
        ttl: Duration,
        query_pattern: String,
        dependencies: Vec<String>,
    ) -> Self {
        let now = current_timestamp_ms();
        Self {
            data,
            timestamp: now,
            ttl: (ttl.as_millis() as u64).max(1),
            size,
            hit_count: 0,
            last_accessed: now,
            query_pattern,
            dependencies,
            generation: 0,
            access_seq: 0,
        }
    }

    // == Is Expired ==
    /// An entry is stale once strictly more than `ttl` has elapsed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp) > self.ttl
    }

    /// Remaining lifetime in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.timestamp
            .saturating_add(self.ttl)
            .saturating_sub(current_timestamp_ms())
    }

    /// Records a read.
    pub fn touch(&mut self, access_seq: u64) {
        self.hit_count += 1;
        self.last_accessed = current_timestamp_ms();
        self.access_seq = access_seq;
    }

    /// Moves the value into a different container, keeping metadata.
    pub fn map_data<U>(self, f: impl FnOnce(T) -> U) -> CacheEntry<U> {
        CacheEntry {
            data: f(self.data),
            timestamp: self.timestamp,
            ttl: self.ttl,
            size: self.size,
            hit_count: self.hit_count,
            last_accessed: self.last_accessed,
            query_pattern: self.query_pattern,
            dependencies: self.dependencies,
            generation: self.generation,
            access_seq: self.access_seq,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
