//! Memory Store Module
//!
//! The fast in-memory tier: a HashMap of encoded entries plus a record for
//! every key with a slow read in flight, used to keep promotions from
//! clobbering newer writes. A key's record lives only as long as its reads.

use std::collections::HashMap;

use bytes::Bytes;

use crate::cache::entry::CacheEntry;
use crate::cache::invalidation::matches;

/// Fast-tier entry: metadata plus the canonical (uncompressed) bytes.
pub type MemoryEntry = CacheEntry<Bytes>;

// == Generation Stamp ==
/// Write generation observed when a suspending read began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationStamp {
    seen: u64,
}

/// Bookkeeping for a key with at least one read in flight.
#[derive(Debug, Clone, Copy)]
struct PendingRead {
    readers: usize,
    /// Generation of the last write, removal or clear touching the key
    last_change: u64,
}

// == Lookup ==
/// Result of a fast-tier read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Fresh entry, already touched
    Hit(MemoryEntry),
    /// Entry was stale and has been removed
    Expired,
    /// Nothing stored under the key
    Missing,
}

// == Memory Store ==
/// Fast-tier storage. Every method is a single atomic step for callers
/// holding the store's lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Key-value storage
    entries: HashMap<String, MemoryEntry>,
    /// Keys with a slow read in flight
    pending: HashMap<String, PendingRead>,
    next_generation: u64,
    next_access: u64,
    /// Running sum of entry sizes
    used_bytes: u64,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    /// Reads a key, removing it first if it has expired.
    pub fn get(&mut self, key: &str) -> Lookup {
        let expired = match self.entries.get(key) {
            None => return Lookup::Missing,
            Some(entry) => entry.is_expired(),
        };

        if expired {
            self.remove(key);
            return Lookup::Expired;
        }

        let seq = self.next_access_seq();
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.touch(seq);
                Lookup::Hit(entry.clone())
            }
            None => Lookup::Missing,
        }
    }

    /// Reads a key without touching it or checking expiry.
    pub fn peek(&self, key: &str) -> Option<&MemoryEntry> {
        self.entries.get(key)
    }

    // == Insert ==
    /// Stores an entry under a new generation, replacing any previous value.
    ///
    /// Returns the generation assigned to the entry.
    pub fn insert(&mut self, key: String, mut entry: MemoryEntry) -> u64 {
        let generation = self.mark_changed(&key);
        entry.generation = generation;
        entry.access_seq = self.next_access_seq();

        self.used_bytes += entry.size as u64;
        if let Some(old) = self.entries.insert(key, entry) {
            self.used_bytes -= old.size as u64;
        }
        generation
    }

    // == Pending Reads ==
    /// Registers a slow read of `key`. Every call must be paired with
    /// [`MemoryStore::end_read`].
    pub fn begin_read(&mut self, key: &str) -> GenerationStamp {
        let pending = self.pending.entry(key.to_string()).or_insert(PendingRead {
            readers: 0,
            last_change: 0,
        });
        pending.readers += 1;
        GenerationStamp {
            seen: self.next_generation,
        }
    }

    /// Releases a read registered by `begin_read`; the key's record is
    /// dropped with its last reader.
    pub fn end_read(&mut self, key: &str) {
        if let Some(pending) = self.pending.get_mut(key) {
            pending.readers = pending.readers.saturating_sub(1);
            if pending.readers == 0 {
                self.pending.remove(key);
            }
        }
    }

    /// Whether `key` is unchanged since `stamp` was taken.
    pub fn can_promote(&self, key: &str, stamp: GenerationStamp) -> bool {
        match self.pending.get(key) {
            Some(pending) => pending.last_change <= stamp.seen,
            None => false,
        }
    }

    // == Promote ==
    /// Inserts a value read from a slower tier, unless the key was written,
    /// removed or cleared since `stamp` was taken.
    pub fn promote(&mut self, key: String, entry: MemoryEntry, stamp: GenerationStamp) -> bool {
        if !self.can_promote(&key, stamp) {
            return false;
        }
        self.insert(key, entry);
        true
    }

    /// Number of keys with a slow read in flight.
    pub fn pending_reads(&self) -> usize {
        self.pending.len()
    }

    // == Remove ==
    /// Removes an entry; readers in flight for the key see it as changed.
    pub fn remove(&mut self, key: &str) -> Option<MemoryEntry> {
        self.mark_changed(key);
        let removed = self.entries.remove(key);
        if let Some(entry) = &removed {
            self.used_bytes -= entry.size as u64;
        }
        removed
    }

    /// Removes every entry whose query pattern matches `pattern`.
    pub fn remove_matching(&mut self, pattern: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| matches(&entry.query_pattern, pattern))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            self.remove(key);
        }
        keys.len()
    }

    /// Removes every entry expired at `now_ms`, returning their keys.
    pub fn remove_expired(&mut self, now_ms: u64) -> Vec<String> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now_ms))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            self.remove(key);
        }
        keys
    }

    /// Key of the entry with the smallest `last_accessed`.
    pub fn least_recently_used(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| (entry.last_accessed, entry.access_seq))
            .map(|(key, _)| key.clone())
    }

    // == Clear ==
    /// Drops every entry and invalidates all outstanding stamps.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.used_bytes = 0;
        self.next_generation += 1;
        let generation = self.next_generation;
        for pending in self.pending.values_mut() {
            pending.last_change = generation;
        }
        count
    }

    /// Sum of `size` over all entries.
    pub fn memory_usage(&self) -> u64 {
        self.used_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn mark_changed(&mut self, key: &str) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        if let Some(pending) = self.pending.get_mut(key) {
            pending.last_change = generation;
        }
        generation
    }

    fn next_access_seq(&mut self) -> u64 {
        self.next_access += 1;
        self.next_access
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::current_timestamp_ms;
    use std::thread::sleep;
    use std::time::Duration;

    fn entry(pattern: &str, size: usize, ttl_ms: u64) -> MemoryEntry {
        CacheEntry::new(
            Bytes::from(vec![b'x'; size]),
            size,
            Duration::from_millis(ttl_ms),
            pattern.to_string(),
            Vec::new(),
        )
    }

    #[test]
    fn test_store_insert_and_get() {
        let mut store = MemoryStore::new();
        store.insert("k1".into(), entry("deals:*", 10, 60_000));

        match store.get("k1") {
            Lookup::Hit(e) => assert_eq!(e.hit_count, 1),
            other => panic!("expected hit, got {:?}", other),
        }
        assert_eq!(store.memory_usage(), 10);
    }

    #[test]
    fn test_store_get_missing() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("nope"), Lookup::Missing);
    }

    #[test]
    fn test_store_lazy_expiry_removes_entry() {
        let mut store = MemoryStore::new();
        store.insert("k1".into(), entry("deals:*", 10, 20));
        sleep(Duration::from_millis(40));

        assert_eq!(store.get("k1"), Lookup::Expired);
        assert!(!store.contains("k1"));
        assert_eq!(store.memory_usage(), 0);
    }

    #[test]
    fn test_store_overwrite_tracks_usage() {
        let mut store = MemoryStore::new();
        store.insert("k1".into(), entry("deals:*", 10, 60_000));
        store.insert("k1".into(), entry("deals:*", 25, 60_000));

        assert_eq!(store.len(), 1);
        assert_eq!(store.memory_usage(), 25);
    }

    #[test]
    fn test_promote_skipped_after_newer_write() {
        let mut store = MemoryStore::new();
        let stamp = store.begin_read("k1");

        store.insert("k1".into(), entry("fresh", 5, 60_000));
        let promoted = store.promote("k1".into(), entry("stale", 5, 60_000), stamp);

        assert!(!promoted);
        assert_eq!(store.peek("k1").unwrap().query_pattern, "fresh");
    }

    #[test]
    fn test_promote_skipped_after_removal_and_clear() {
        let mut store = MemoryStore::new();
        store.insert("k1".into(), entry("a", 5, 60_000));
        store.remove("k1");
        let stamp = store.begin_read("k1");
        store.clear();

        assert!(!store.promote("k1".into(), entry("a", 5, 60_000), stamp));
        assert!(store.is_empty());
    }

    #[test]
    fn test_promote_when_untouched() {
        let mut store = MemoryStore::new();
        let stamp = store.begin_read("k1");
        assert!(store.promote("k1".into(), entry("a", 5, 60_000), stamp));
        assert!(store.contains("k1"));
    }

    #[test]
    fn test_promote_skipped_after_removal_during_read() {
        let mut store = MemoryStore::new();
        let stamp = store.begin_read("k1");
        store.insert("k1".into(), entry("a", 5, 60_000));
        store.remove("k1");

        assert!(!store.promote("k1".into(), entry("stale", 5, 60_000), stamp));
        assert!(!store.contains("k1"));
    }

    #[test]
    fn test_later_reader_may_promote_after_write() {
        let mut store = MemoryStore::new();
        let first = store.begin_read("k1");
        store.insert("k1".into(), entry("a", 5, 60_000));
        store.remove("k1");
        let second = store.begin_read("k1");

        assert!(!store.can_promote("k1", first));
        assert!(store.can_promote("k1", second));
    }

    #[test]
    fn test_pending_reads_are_released() {
        let mut store = MemoryStore::new();
        store.begin_read("k1");
        store.begin_read("k1");
        store.begin_read("k2");
        assert_eq!(store.pending_reads(), 2);

        store.end_read("k1");
        assert_eq!(store.pending_reads(), 2);
        store.end_read("k1");
        store.end_read("k2");
        assert_eq!(store.pending_reads(), 0);

        // unregistered keys are ignored
        store.end_read("k3");
        assert_eq!(store.pending_reads(), 0);
    }

    #[test]
    fn test_removed_keys_leave_no_bookkeeping() {
        let mut store = MemoryStore::new();
        for i in 0..100 {
            store.insert(format!("k{}", i), entry("p", 1, 60_000));
        }
        for i in 0..100 {
            store.remove(&format!("k{}", i));
        }

        assert!(store.is_empty());
        assert_eq!(store.pending_reads(), 0);
    }

    #[test]
    fn test_remove_matching_is_prefix_only() {
        let mut store = MemoryStore::new();
        store.insert("a".into(), entry("company:c1", 1, 60_000));
        store.insert("b".into(), entry("company:c2", 1, 60_000));
        store.insert("c".into(), entry("deals:company:c1", 1, 60_000));

        assert_eq!(store.remove_matching("company:*"), 2);
        assert!(store.contains("c"));
    }

    #[test]
    fn test_remove_expired() {
        let mut store = MemoryStore::new();
        store.insert("short".into(), entry("a", 1, 10));
        store.insert("long".into(), entry("a", 1, 60_000));

        let removed = store.remove_expired(current_timestamp_ms() + 1_000);
        assert_eq!(removed, vec!["short".to_string()]);
        assert!(store.contains("long"));
    }

    #[test]
    fn test_least_recently_used_follows_touches() {
        let mut store = MemoryStore::new();
        store.insert("a".into(), entry("p", 1, 60_000));
        store.insert("b".into(), entry("p", 1, 60_000));
        store.insert("c".into(), entry("p", 1, 60_000));

        assert_eq!(store.least_recently_used(), Some("a".to_string()));
        store.get("a");
        assert_eq!(store.least_recently_used(), Some("b".to_string()));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut store = MemoryStore::new();
        store.insert("a".into(), entry("p", 3, 60_000));

        assert_eq!(store.clear(), 1);
        assert_eq!(store.clear(), 0);
        assert_eq!(store.len(), 0);
        assert_eq!(store.memory_usage(), 0);
    }
}
