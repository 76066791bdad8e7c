//! Cache Statistics Module
//!
//! Human-oriented view derived from the raw metrics snapshot.

use serde::Serialize;

use crate::cache::metrics::MetricsSnapshot;
use crate::config::MB;

// == Cache Stats ==
/// Derived cache statistics, percentages in 0..=100.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total_queries: u64,
    /// hits / total_queries as a percentage
    pub hit_rate: f64,
    /// Cumulative compression savings as a percentage
    pub compression_ratio: f64,
    pub avg_response_time_ms: f64,
    /// Entries currently in the fast tier
    pub memory_entries: usize,
    pub memory_usage_mb: f64,
    pub storage_usage_mb: f64,
    pub evictions: u64,
    pub promotions: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Builds the view from a metrics snapshot and the live entry count.
    pub fn from_snapshot(snapshot: &MetricsSnapshot, memory_entries: usize) -> Self {
        let hit_rate = if snapshot.total_queries == 0 {
            0.0
        } else {
            snapshot.hits as f64 / snapshot.total_queries as f64 * 100.0
        };

        Self {
            hits: snapshot.hits,
            misses: snapshot.misses,
            total_queries: snapshot.total_queries,
            hit_rate,
            compression_ratio: snapshot.compression_ratio * 100.0,
            avg_response_time_ms: snapshot.avg_response_time_ms,
            memory_entries,
            memory_usage_mb: snapshot.memory_usage as f64 / MB as f64,
            storage_usage_mb: snapshot.storage_usage as f64 / MB as f64,
            evictions: snapshot.evictions,
            promotions: snapshot.promotions,
        }
    }
}
