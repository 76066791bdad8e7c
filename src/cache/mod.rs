//! Cache Module
//!
//! Multi-tier query caching: a fast in-memory tier with LRU and TTL
//! eviction in front of a best-effort persistent tier, with LZ4
//! compression, pattern invalidation and metrics.

mod backend;
mod compression;
mod entry;
mod eviction;
mod invalidation;
mod key;
mod metrics;
mod persistent;
mod predictive;
mod stats;
mod store;
mod tiered;


// Re-export public types
pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use compression::{from_canonical, to_canonical, CompressionCodec, Encoded};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use eviction::EvictionManager;
pub use invalidation::{matches, InvalidationReport, Rule, RuleTable, WILDCARD};
pub use key::{default_pattern_rules, CacheKeyEngine, PatternRule, QueryParams, KEY_SEPARATOR};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use persistent::{BackendReport, PersistentStore, TierOutcome};
pub use predictive::{default_predictive_rules, WarmupHook};
pub use stats::CacheStats;
pub use store::{GenerationStamp, Lookup, MemoryEntry, MemoryStore};
pub use tiered::{EntryInfo, TieredCache};
