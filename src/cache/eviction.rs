//! Eviction Module
//!
//! Capacity (LRU) and time (TTL) removal policies for the fast tier.

use crate::cache::entry::current_timestamp_ms;
use crate::cache::store::MemoryStore;

// == Eviction Manager ==
/// Applies the fast-tier budget before writes and sweeps stale entries.
///
/// The capacity loop runs before an insert and only looks at current usage,
/// so a single entry larger than `max_memory_size` empties the tier and is
/// still inserted. Callers that need a hard cap must bound entry sizes
/// themselves.
#[derive(Debug, Clone, Copy)]
pub struct EvictionManager {
    max_memory_size: u64,
}

impl EvictionManager {
    pub fn new(max_memory_size: u64) -> Self {
        Self { max_memory_size }
    }

    pub fn max_memory_size(&self) -> u64 {
        self.max_memory_size
    }

    /// Sum of entry sizes in the fast tier.
    pub fn memory_usage(&self, store: &MemoryStore) -> u64 {
        store.memory_usage()
    }

    // == Evict LRU ==
    /// Removes the single least recently accessed entry, if any.
    pub fn evict_lru(&self, store: &mut MemoryStore) -> Option<String> {
        let key = store.least_recently_used()?;
        store.remove(&key);
        tracing::debug!("LRU eviction: {}", key);
        Some(key)
    }

    // == Make Room ==
    /// Evicts until usage drops under budget or the tier is empty.
    ///
    /// Returns the evicted keys in eviction order.
    pub fn make_room(&self, store: &mut MemoryStore) -> Vec<String> {
        let mut evicted = Vec::new();
        while store.memory_usage() >= self.max_memory_size && !store.is_empty() {
            match self.evict_lru(store) {
                Some(key) => evicted.push(key),
                None => break,
            }
        }
        evicted
    }

    // == Sweep ==
    /// Removes every expired entry.
    pub fn sweep_expired(&self, store: &mut MemoryStore) -> Vec<String> {
        store.remove_expired(current_timestamp_ms())
    }
}
