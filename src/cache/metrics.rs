//! Cache Metrics Collection
//!
//! Process-local counters shared by every tier. Counters are cumulative and
//! are never reset by `clear()`; only the usage gauges follow tier contents.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    total_queries: AtomicU64,
    total_response_us: AtomicU64,

    memory_usage: AtomicU64,
    storage_usage: AtomicU64,

    compressed_original_bytes: AtomicU64,
    compressed_output_bytes: AtomicU64,
    // f64 bits
    last_compression_ratio: AtomicU64,

    evictions: AtomicU64,
    expirations: AtomicU64,
    promotions: AtomicU64,
    promotions_skipped: AtomicU64,
    persistent_fallbacks: AtomicU64,
    persistent_failures: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    // Queries
    pub fn record_hit(&self, latency: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.record_query(latency);
    }

    pub fn record_miss(&self, latency: Duration) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.record_query(latency);
    }

    fn record_query(&self, latency: Duration) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        self.total_response_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    // Gauges
    pub fn set_memory_usage(&self, bytes: u64) {
        self.memory_usage.store(bytes, Ordering::Relaxed);
    }

    pub fn set_storage_usage(&self, bytes: u64) {
        self.storage_usage.store(bytes, Ordering::Relaxed);
    }

    // Compression
    /// Records one compression event.
    pub fn record_compression(&self, original: usize, compressed: usize) {
        if original == 0 {
            return;
        }
        self.compressed_original_bytes
            .fetch_add(original as u64, Ordering::Relaxed);
        self.compressed_output_bytes
            .fetch_add(compressed as u64, Ordering::Relaxed);
        let ratio = (original as f64 - compressed as f64) / original as f64;
        self.last_compression_ratio
            .store(ratio.to_bits(), Ordering::Relaxed);
    }

    /// Space saved across every compression event, 0.0 when none happened.
    pub fn compression_ratio(&self) -> f64 {
        let original = self.compressed_original_bytes.load(Ordering::Relaxed);
        if original == 0 {
            return 0.0;
        }
        let output = self.compressed_output_bytes.load(Ordering::Relaxed);
        (original as f64 - output as f64) / original as f64
    }

    pub fn last_compression_ratio(&self) -> f64 {
        f64::from_bits(self.last_compression_ratio.load(Ordering::Relaxed))
    }

    // Tier events
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_promotion_skipped(&self) {
        self.promotions_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistent_fallback(&self) {
        self.persistent_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistent_failure(&self) {
        self.persistent_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidations(&self, count: u64) {
        self.invalidations.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_queries = self.total_queries.load(Ordering::Relaxed);
        let total_us = self.total_response_us.load(Ordering::Relaxed);
        let avg_response_time_ms = if total_queries == 0 {
            0.0
        } else {
            total_us as f64 / total_queries as f64 / 1000.0
        };

        MetricsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            total_queries,
            avg_response_time_ms,
            memory_usage: self.memory_usage.load(Ordering::Relaxed),
            storage_usage: self.storage_usage.load(Ordering::Relaxed),
            compression_ratio: self.compression_ratio(),
            last_compression_ratio: self.last_compression_ratio(),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            promotions_skipped: self.promotions_skipped.load(Ordering::Relaxed),
            persistent_fallbacks: self.persistent_fallbacks.load(Ordering::Relaxed),
            persistent_failures: self.persistent_failures.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot for reporting
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub total_queries: u64,
    pub avg_response_time_ms: f64,
    /// Bytes held by the fast tier
    pub memory_usage: u64,
    /// Bytes held by the persistent backends
    pub storage_usage: u64,
    /// Cumulative space saved by compression (0.0..1.0)
    pub compression_ratio: f64,
    /// Space saved by the most recent compression only
    pub last_compression_ratio: f64,
    pub evictions: u64,
    pub expirations: u64,
    pub promotions: u64,
    pub promotions_skipped: u64,
    pub persistent_fallbacks: u64,
    pub persistent_failures: u64,
    pub invalidations: u64,
}
