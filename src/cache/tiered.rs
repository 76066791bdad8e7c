//! Tiered Cache Module
//!
//! The public facade: a fast in-memory tier in front of an optional
//! best-effort persistent tier, with pattern invalidation, metrics and an
//! optional warmup hook.
//!
//! Every internal failure degrades to a miss or a no-op. The only error a
//! caller sees is a value that cannot be serialized on `set`.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::backend::{FileBackend, MemoryBackend, StorageBackend};
use crate::cache::compression::{from_canonical, to_canonical, CompressionCodec};
use crate::cache::entry::CacheEntry;
use crate::cache::eviction::EvictionManager;
use crate::cache::invalidation::{InvalidationReport, RuleTable};
use crate::cache::key::{CacheKeyEngine, QueryParams};
use crate::cache::metrics::{CacheMetrics, MetricsSnapshot};
use crate::cache::persistent::{PersistentStore, TierOutcome};
use crate::cache::predictive::{self, default_predictive_rules, WarmupHook};
use crate::cache::stats::CacheStats;
use crate::cache::store::{GenerationStamp, Lookup, MemoryEntry, MemoryStore};
use crate::config::CacheConfig;
use crate::error::Result;

// == Pending Read ==
/// A slow read registered with the fast tier; released on drop, so a
/// cancelled request leaves no bookkeeping behind.
struct PendingRead<'a> {
    memory: &'a Mutex<MemoryStore>,
    key: &'a str,
    stamp: GenerationStamp,
}

impl<'a> PendingRead<'a> {
    fn begin(memory: &'a Mutex<MemoryStore>, key: &'a str) -> Self {
        let stamp = memory.lock().begin_read(key);
        Self { memory, key, stamp }
    }
}

impl Drop for PendingRead<'_> {
    fn drop(&mut self) {
        self.memory.lock().end_read(self.key);
    }
}

// == Entry Info ==
/// Fast-tier metadata of a single entry, as returned by [`TieredCache::inspect`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub query_pattern: String,
    pub dependencies: Vec<String>,
    /// Uncompressed size in bytes
    pub size: usize,
    pub hit_count: u64,
    pub generation: u64,
    /// Creation time (Unix milliseconds)
    pub timestamp: u64,
    pub ttl_ms: u64,
    pub ttl_remaining_ms: u64,
}

impl EntryInfo {
    fn from_entry(key: String, entry: &MemoryEntry) -> Self {
        Self {
            key,
            query_pattern: entry.query_pattern.clone(),
            dependencies: entry.dependencies.clone(),
            size: entry.size,
            hit_count: entry.hit_count,
            generation: entry.generation,
            timestamp: entry.timestamp,
            ttl_ms: entry.ttl,
            ttl_remaining_ms: entry.ttl_remaining_ms(),
        }
    }
}

// == Tiered Cache ==
/// Multi-tier query cache.
///
/// Owned by its caller and usually shared as `Arc<TieredCache>`. The
/// background sweep started by [`crate::tasks::spawn_sweep_task`] stops when
/// [`TieredCache::dispose`] is called or the cache is dropped.
pub struct TieredCache {
    config: CacheConfig,
    keys: CacheKeyEngine,
    dependencies: RuleTable,
    predictive_rules: RuleTable,
    memory: Mutex<MemoryStore>,
    eviction: EvictionManager,
    /// `None` when the persistent tier is disabled
    persistent: Option<PersistentStore>,
    metrics: Arc<CacheMetrics>,
    warmup_hook: Option<Arc<dyn WarmupHook>>,
    shutdown: CancellationToken,
}

impl TieredCache {
    // == Constructors ==
    /// Creates a cache whose persistent tier (if enabled) is the in-process
    /// fallback backend only.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_backends(config, None, Arc::new(MemoryBackend::new("fallback")))
    }

    /// Creates a cache, opening the durable file store under
    /// `config.persist_dir` when one is set.
    ///
    /// A store that cannot be opened is logged and the cache runs
    /// fallback-only.
    pub async fn open(config: CacheConfig) -> Self {
        let preferred = match (&config.persist_dir, config.enable_persistent_tier) {
            (Some(dir), true) => open_file_backend(dir).await,
            _ => None,
        };
        Self::with_backends(config, preferred, Arc::new(MemoryBackend::new("fallback")))
    }

    /// Creates a cache over explicit persistent backends.
    pub fn with_backends(
        config: CacheConfig,
        preferred: Option<Arc<dyn StorageBackend>>,
        fallback: Arc<dyn StorageBackend>,
    ) -> Self {
        let metrics = Arc::new(CacheMetrics::new());
        let persistent = config.enable_persistent_tier.then(|| {
            let codec = CompressionCodec::new(config.compression_threshold)
                .with_metrics(metrics.clone());
            PersistentStore::new(
                preferred,
                fallback,
                codec,
                config.persist_timeout,
                config.max_storage_size,
            )
        });

        info!(
            "Tiered cache ready: memory budget {} bytes, persistent tier {}",
            config.max_memory_size,
            match &persistent {
                Some(store) if store.has_preferred() => "durable + fallback",
                Some(_) => "fallback only",
                None => "disabled",
            }
        );

        Self {
            eviction: EvictionManager::new(config.max_memory_size),
            keys: CacheKeyEngine::default(),
            dependencies: RuleTable::default_dependencies(),
            predictive_rules: default_predictive_rules(),
            memory: Mutex::new(MemoryStore::new()),
            persistent,
            metrics,
            warmup_hook: None,
            shutdown: CancellationToken::new(),
            config,
        }
    }

    pub fn with_key_engine(mut self, keys: CacheKeyEngine) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_dependency_rules(mut self, rules: RuleTable) -> Self {
        self.dependencies = rules;
        self
    }

    pub fn with_predictive_rules(mut self, rules: RuleTable) -> Self {
        self.predictive_rules = rules;
        self
    }

    /// Registers the collaborator notified after writes.
    pub fn with_warmup_hook(mut self, hook: Arc<dyn WarmupHook>) -> Self {
        self.warmup_hook = Some(hook);
        self
    }

    // == Accessors ==
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn key_engine(&self) -> &CacheKeyEngine {
        &self.keys
    }

    pub fn dependency_rules(&self) -> &RuleTable {
        &self.dependencies
    }

    // == Get ==
    /// Looks a query up, fast tier first, then the persistent tier.
    ///
    /// A persistent hit is promoted into the fast tier unless the key was
    /// written, removed or cleared while the read was in flight. A stored
    /// value that does not decode as `T` counts as a miss.
    pub async fn get<T: DeserializeOwned>(&self, query_type: &str, params: &QueryParams) -> Option<T> {
        let started = Instant::now();
        let key = self.keys.build_key(query_type, params);

        let lookup = self.memory.lock().get(&key);
        match lookup {
            Lookup::Hit(entry) => return self.finish_hit(&key, &entry, started),
            Lookup::Expired => {
                debug!("Expired on read: {}", key);
                self.metrics.record_expirations(1);
                self.refresh_memory_gauge();
                // the persisted copy shares the same deadline
                if let Some(persistent) = &self.persistent {
                    persistent.delete(&key).await;
                }
                return self.finish_miss(started);
            }
            Lookup::Missing => {}
        }

        let Some(persistent) = &self.persistent else {
            return self.finish_miss(started);
        };

        let read = PendingRead::begin(&self.memory, &key);
        let outcome = persistent.get(&key).await;
        self.record_outcome(&outcome);

        let Some(mut entry) = outcome.into_value().flatten() else {
            return self.finish_miss(started);
        };
        if entry.is_expired() {
            debug!("Expired in persistent tier: {}", key);
            persistent.delete(&key).await;
            self.metrics.record_expirations(1);
            return self.finish_miss(started);
        }

        entry.touch(0);
        let promoted = {
            let mut memory = self.memory.lock();
            if memory.can_promote(&key, read.stamp) {
                let evicted = self.eviction.make_room(&mut memory);
                self.metrics.record_evictions(evicted.len() as u64);
                memory.promote(key.clone(), entry.clone(), read.stamp)
            } else {
                false
            }
        };
        if promoted {
            self.metrics.record_promotion();
            self.refresh_memory_gauge();
        } else {
            debug!("Promotion skipped, {} changed during the read", key);
            self.metrics.record_promotion_skipped();
        }

        self.finish_hit(&key, &entry, started)
    }

    fn finish_hit<T: DeserializeOwned>(&self, key: &str, entry: &MemoryEntry, started: Instant) -> Option<T> {
        match from_canonical::<T>(&entry.data) {
            Ok(value) => {
                self.metrics.record_hit(started.elapsed());
                Some(value)
            }
            Err(e) => {
                warn!("Cached value for {} does not decode as requested: {}", key, e);
                self.finish_miss(started)
            }
        }
    }

    fn finish_miss<T>(&self, started: Instant) -> Option<T> {
        self.metrics.record_miss(started.elapsed());
        None
    }

    // == Set ==
    /// Stores a query result.
    ///
    /// Writes the fast tier synchronously (after making room), then writes
    /// through to the persistent tier when the value is larger than
    /// `persist_min_size`. Fails only if `data` cannot be serialized.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        query_type: &str,
        params: &QueryParams,
        data: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let raw = to_canonical(data)?;
        let key = self.keys.build_key(query_type, params);
        let pattern = self.keys.derive_pattern(query_type, params);
        let dependencies = self.dependencies.targets_for(&pattern);
        let size = raw.len();
        let entry = CacheEntry::new(
            raw,
            size,
            ttl.unwrap_or(self.config.default_ttl),
            pattern.clone(),
            dependencies,
        );

        if size as u64 > self.config.max_memory_size {
            warn!(
                "Entry {} ({} bytes) exceeds the memory budget of {} bytes",
                key, size, self.config.max_memory_size
            );
        }

        {
            let mut memory = self.memory.lock();
            let evicted = self.eviction.make_room(&mut memory);
            self.metrics.record_evictions(evicted.len() as u64);
            memory.insert(key.clone(), entry.clone());
            self.metrics.set_memory_usage(memory.memory_usage());
        }

        if let Some(persistent) = &self.persistent {
            if size > self.config.persist_min_size {
                let outcome = persistent.put(&key, &entry).await;
                self.record_outcome(&outcome);
            } else {
                // an older, larger value may still be persisted under this key
                persistent.delete(&key).await;
            }
            self.metrics.set_storage_usage(persistent.stored_bytes().await);
        }

        self.notify_warmup(&pattern);
        Ok(())
    }

    fn notify_warmup(&self, pattern: &str) {
        if !self.config.enable_predictive {
            return;
        }
        if let Some(hook) = &self.warmup_hook {
            let targets = self.predictive_rules.targets_for(pattern);
            predictive::fire(hook.clone(), pattern.to_string(), targets);
        }
    }

    fn record_outcome<T>(&self, outcome: &TierOutcome<T>) {
        match outcome {
            TierOutcome::FellBack(_) => self.metrics.record_persistent_fallback(),
            TierOutcome::Failed(_) => self.metrics.record_persistent_failure(),
            TierOutcome::Preferred(_) | TierOutcome::Skipped => {}
        }
    }

    // == Invalidate ==
    /// Removes every entry whose query pattern matches `pattern`, in both
    /// tiers. Does not follow dependency rules.
    pub async fn invalidate(&self, pattern: &str) -> InvalidationReport {
        let memory_removed = self.memory.lock().remove_matching(pattern);
        self.refresh_memory_gauge();

        let mut report = InvalidationReport {
            patterns: vec![pattern.to_string()],
            memory_removed,
            ..Default::default()
        };
        if let Some(persistent) = &self.persistent {
            let removed = persistent.remove_matching(pattern).await;
            report.persistent_removed = removed.removed;
            report.failures = removed.failures;
            self.metrics.set_storage_usage(persistent.stored_bytes().await);
        }

        for failure in &report.failures {
            warn!("Partial invalidation of {}: {}", pattern, failure);
        }
        self.metrics.record_invalidations(report.total() as u64);
        info!(
            "Invalidated {}: {} memory, {} persistent",
            pattern, report.memory_removed, report.persistent_removed
        );
        report
    }

    /// Invalidates `pattern` and then every pattern the dependency table
    /// lists for it.
    pub async fn invalidate_related(&self, pattern: &str) -> InvalidationReport {
        let mut report = self.invalidate(pattern).await;
        for target in self.dependencies.targets_for(pattern) {
            if target != pattern {
                report.merge(self.invalidate(&target).await);
            }
        }
        report
    }

    // == Clear ==
    /// Empties both tiers.
    ///
    /// Cumulative counters (hits, misses, evictions, ...) are kept; only the
    /// usage gauges drop back. Clearing an empty cache is a no-op.
    pub async fn clear(&self) -> InvalidationReport {
        let memory_removed = self.memory.lock().clear();
        self.metrics.set_memory_usage(0);

        let mut report = InvalidationReport {
            memory_removed,
            ..Default::default()
        };
        if let Some(persistent) = &self.persistent {
            let cleared = persistent.clear().await;
            report.persistent_removed = cleared.removed;
            report.failures = cleared.failures;
            self.metrics.set_storage_usage(persistent.stored_bytes().await);
        }

        info!(
            "Cache cleared: {} memory, {} persistent",
            report.memory_removed, report.persistent_removed
        );
        report
    }

    // == Sweep ==
    /// Removes expired fast-tier entries; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let removed = {
            let mut memory = self.memory.lock();
            let removed = self.eviction.sweep_expired(&mut memory);
            self.metrics.set_memory_usage(memory.memory_usage());
            removed.len()
        };
        self.metrics.record_expirations(removed as u64);
        removed
    }

    // == Inspect ==
    /// Metadata of a fresh fast-tier entry, without touching LRU state or
    /// metrics.
    pub fn inspect(&self, query_type: &str, params: &QueryParams) -> Option<EntryInfo> {
        let key = self.keys.build_key(query_type, params);
        let memory = self.memory.lock();
        let entry = memory.peek(&key).filter(|entry| !entry.is_expired())?;
        Some(EntryInfo::from_entry(key, entry))
    }

    // == Metrics ==
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn get_stats(&self) -> CacheStats {
        let entries = self.memory.lock().len();
        CacheStats::from_snapshot(&self.metrics.snapshot(), entries)
    }

    fn refresh_memory_gauge(&self) {
        let usage = self.memory.lock().memory_usage();
        self.metrics.set_memory_usage(usage);
    }

    // == Lifecycle ==
    /// Stops background work tied to this cache. Idempotent.
    pub fn dispose(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Disposing tiered cache");
            self.shutdown.cancel();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled by `dispose` or drop.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl Drop for TieredCache {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn open_file_backend(dir: &Path) -> Option<Arc<dyn StorageBackend>> {
    match FileBackend::open(dir).await {
        Ok(backend) => {
            info!("Durable store opened at {:?}", backend.dir());
            Some(Arc::new(backend))
        }
        Err(e) => {
            warn!("Durable store unavailable at {:?}, running fallback-only: {}", dir, e);
            None
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheOverrides;
    use crate::error::CacheError;
    use serde_json::{json, Value};

    fn params(pairs: &[(&str, Value)]) -> QueryParams {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn memory_only() -> TieredCache {
        TieredCache::new(CacheConfig::with_overrides(CacheOverrides {
            enable_persistent_tier: Some(false),
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = memory_only();
        let p = params(&[("ownerId", json!("u1"))]);
        cache.set("deals:list", &p, &vec![1, 2, 3], None).await.unwrap();

        let found: Option<Vec<i32>> = cache.get("deals:list", &p).await;
        assert_eq!(found, Some(vec![1, 2, 3]));
        assert_eq!(cache.get_metrics().hits, 1);
    }

    #[tokio::test]
    async fn test_get_missing_counts_miss() {
        let cache = memory_only();
        let found: Option<Value> = cache.get("deals:list", &QueryParams::new()).await;
        assert!(found.is_none());

        let metrics = cache.get_metrics();
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.total_queries, 1);
    }

    #[tokio::test]
    async fn test_separator_in_query_type_is_a_different_query() {
        let cache = memory_only();
        cache.set("x", &params(&[("a", json!(1))]), &"first", None).await.unwrap();

        let found: Option<Value> = cache.get("x|a:1", &QueryParams::new()).await;
        assert!(found.is_none());
        let found: Option<String> = cache.get("x", &params(&[("a", json!(1))])).await;
        assert_eq!(found.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_a_miss() {
        let cache = memory_only();
        let p = QueryParams::new();
        cache.set("mrr:summary", &p, &json!({"total": 10}), None).await.unwrap();

        let found: Option<Vec<String>> = cache.get("mrr:summary", &p).await;
        assert!(found.is_none());
        assert_eq!(cache.get_metrics().misses, 1);
    }

    #[tokio::test]
    async fn test_set_rejects_unserializable_value() {
        use std::collections::HashMap;

        let cache = memory_only();
        let mut bad: HashMap<(i32, i32), i32> = HashMap::new();
        bad.insert((1, 2), 3);

        let result = cache.set("deals:list", &QueryParams::new(), &bad, None).await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
        assert_eq!(cache.get_stats().memory_entries, 0);
    }

    #[tokio::test]
    async fn test_set_records_dependencies() {
        let cache = memory_only();
        let p = params(&[("companyId", json!("42"))]);
        cache.set("deals:list", &p, &json!([]), None).await.unwrap();

        let info = cache.inspect("deals:list", &p).unwrap();
        assert_eq!(info.query_pattern, "deals:company:42");
        assert_eq!(
            info.dependencies,
            vec!["company:*", "clients:deal:*", "payments:*", "mrr:*"]
        );
    }

    #[tokio::test]
    async fn test_inspect_does_not_touch() {
        let cache = memory_only();
        let p = params(&[("companyId", json!("c1"))]);
        cache.set("company:view", &p, &json!({"name": "Acme"}), None).await.unwrap();

        assert_eq!(cache.inspect("company:view", &p).unwrap().hit_count, 0);
        assert_eq!(cache.inspect("company:view", &p).unwrap().hit_count, 0);
        assert_eq!(cache.get_metrics().total_queries, 0);
    }

    #[tokio::test]
    async fn test_invalidate_related_cascades() {
        let cache = memory_only();
        cache
            .set("company:view", &params(&[("companyId", json!("c1"))]), &json!(1), None)
            .await
            .unwrap();
        cache
            .set("contacts:list", &params(&[("companyId", json!("c1"))]), &json!(2), None)
            .await
            .unwrap();
        cache.set("tasks:list", &QueryParams::new(), &json!(3), None).await.unwrap();

        let plain = cache.invalidate("company:*").await;
        assert_eq!(plain.memory_removed, 1);

        cache
            .set("company:view", &params(&[("companyId", json!("c1"))]), &json!(1), None)
            .await
            .unwrap();
        let cascaded = cache.invalidate_related("company:*").await;
        assert_eq!(cascaded.memory_removed, 2);
        assert_eq!(cache.get_stats().memory_entries, 1);
    }

    #[tokio::test]
    async fn test_clear_keeps_counters() {
        let cache = memory_only();
        let p = QueryParams::new();
        cache.set("mrr:summary", &p, &json!(1), None).await.unwrap();
        let _: Option<Value> = cache.get("mrr:summary", &p).await;

        assert_eq!(cache.clear().await.memory_removed, 1);
        assert_eq!(cache.clear().await.memory_removed, 0);

        let metrics = cache.get_metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.memory_usage, 0);
        assert_eq!(cache.get_stats().memory_entries, 0);
    }

    #[tokio::test]
    async fn test_small_entries_stay_memory_only() {
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        let cache = TieredCache::with_backends(CacheConfig::default(), None, fallback.clone());

        cache.set("mrr:summary", &QueryParams::new(), &json!(1), None).await.unwrap();
        assert!(fallback.is_empty());

        let big = "x".repeat(2_000);
        cache.set("deals:list", &QueryParams::new(), &big, None).await.unwrap();
        assert_eq!(fallback.len(), 1);
        assert!(cache.get_metrics().storage_usage > 0);
    }

    #[tokio::test]
    async fn test_shrunk_value_drops_persisted_copy() {
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        let cache = TieredCache::with_backends(CacheConfig::default(), None, fallback.clone());
        let p = QueryParams::new();

        cache.set("deals:list", &p, &"x".repeat(2_000), None).await.unwrap();
        assert_eq!(fallback.len(), 1);
        cache.set("deals:list", &p, &"small", None).await.unwrap();
        assert!(fallback.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_expired_updates_metrics() {
        let cache = memory_only();
        cache
            .set("mrr:summary", &QueryParams::new(), &json!(1), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.sweep_expired(), 1);
        let metrics = cache.get_metrics();
        assert_eq!(metrics.expirations, 1);
        assert_eq!(metrics.memory_usage, 0);
    }

    #[tokio::test]
    async fn test_dispose_cancels_token() {
        let cache = memory_only();
        let token = cache.shutdown_token();
        assert!(!cache.is_disposed());

        cache.dispose();
        cache.dispose();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_drop_cancels_token() {
        let cache = memory_only();
        let token = cache.shutdown_token();
        drop(cache);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_open_without_dir_is_fallback_only() {
        let cache = TieredCache::open(CacheConfig::default()).await;
        let big = "y".repeat(4_000);
        let p = QueryParams::new();
        cache.set("deals:list", &p, &big, None).await.unwrap();

        cache.memory.lock().clear();
        let found: Option<String> = cache.get("deals:list", &p).await;
        assert_eq!(found, Some(big));
        assert_eq!(cache.get_metrics().promotions, 1);
    }

    #[tokio::test]
    async fn test_read_bookkeeping_is_released() {
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        let cache = TieredCache::with_backends(CacheConfig::default(), None, fallback);
        let big = "z".repeat(2_000);

        for i in 0..50 {
            let p = params(&[("dealId", json!(i))]);
            cache.set("deals:view", &p, &big, None).await.unwrap();
        }
        cache.memory.lock().clear();

        for i in 0..100 {
            let p = params(&[("dealId", json!(i))]);
            let _: Option<String> = cache.get("deals:view", &p).await;
        }

        let metrics = cache.get_metrics();
        assert_eq!(metrics.promotions, 50);
        assert_eq!(metrics.misses, 50);
        assert_eq!(cache.memory.lock().pending_reads(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_read_is_released() {
        use async_trait::async_trait;
        use bytes::Bytes;

        struct StalledBackend;

        #[async_trait]
        impl StorageBackend for StalledBackend {
            fn name(&self) -> &str {
                "stalled"
            }
            async fn get(&self, _key: &str) -> Result<Option<Bytes>> {
                std::future::pending().await
            }
            async fn put(&self, _key: &str, _data: Bytes) -> Result<()> {
                std::future::pending().await
            }
            async fn delete(&self, _key: &str) -> Result<bool> {
                std::future::pending().await
            }
            async fn clear(&self) -> Result<usize> {
                std::future::pending().await
            }
            async fn keys(&self) -> Result<Vec<String>> {
                std::future::pending().await
            }
            async fn stored_bytes(&self) -> Result<u64> {
                std::future::pending().await
            }
        }

        let config = CacheConfig::with_overrides(CacheOverrides {
            persist_timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        });
        let cache = TieredCache::with_backends(
            config,
            Some(Arc::new(StalledBackend)),
            Arc::new(MemoryBackend::default()),
        );

        let params = QueryParams::new();
        let read = cache.get::<Value>("deals:list", &params);
        let result = tokio::time::timeout(Duration::from_millis(20), read).await;
        assert!(result.is_err());
        assert_eq!(cache.memory.lock().pending_reads(), 0);
    }
}
