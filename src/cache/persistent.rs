//! Persistent Tier
//!
//! Best-effort durable storage behind the fast tier. Writes go to the
//! preferred backend and fall back to the flat backend on any failure;
//! reads try the preferred backend first. Nothing here returns an error to
//! the coordinator: every operation reports a [`TierOutcome`] instead.
//!
//! Records are framed as `u32` (big-endian) header length, JSON header,
//! then the payload bytes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::cache::backend::StorageBackend;
use crate::cache::compression::{CompressionCodec, Encoded};
use crate::cache::entry::CacheEntry;
use crate::cache::invalidation::matches;
use crate::cache::store::MemoryEntry;
use crate::error::{CacheError, Result};

// == Tier Outcome ==
/// Explicit result of a persistent-tier operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome<T> {
    /// Answered by the preferred backend
    Preferred(T),
    /// Preferred backend absent or failing; the fallback answered
    FellBack(T),
    /// Nothing was attempted (tier disabled, or both backends over quota)
    Skipped,
    /// Every backend failed
    Failed(String),
}

impl<T> TierOutcome<T> {
    /// The value, whichever backend produced it.
    pub fn into_value(self) -> Option<T> {
        match self {
            TierOutcome::Preferred(v) | TierOutcome::FellBack(v) => Some(v),
            TierOutcome::Skipped | TierOutcome::Failed(_) => None,
        }
    }

    pub fn fell_back(&self) -> bool {
        matches!(self, TierOutcome::FellBack(_))
    }

    pub fn failed(&self) -> bool {
        matches!(self, TierOutcome::Failed(_))
    }
}

// == Backend Report ==
/// Result of an operation that touches every backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendReport {
    pub removed: usize,
    pub failures: Vec<String>,
}

// == Record Framing ==
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordHeader {
    timestamp: u64,
    ttl: u64,
    size: usize,
    hit_count: u64,
    last_accessed: u64,
    query_pattern: String,
    dependencies: Vec<String>,
    compressed: bool,
}

fn encode_record(entry: &MemoryEntry, encoded: &Encoded) -> Result<Bytes> {
    let header = RecordHeader {
        timestamp: entry.timestamp,
        ttl: entry.ttl,
        size: entry.size,
        hit_count: entry.hit_count,
        last_accessed: entry.last_accessed,
        query_pattern: entry.query_pattern.clone(),
        dependencies: entry.dependencies.clone(),
        compressed: encoded.compressed,
    };
    let header = serde_json::to_vec(&header)?;

    let mut frame = BytesMut::with_capacity(4 + header.len() + encoded.payload.len());
    frame.put_u32(header.len() as u32);
    frame.put_slice(&header);
    frame.put_slice(&encoded.payload);
    Ok(frame.freeze())
}

fn decode_header(mut frame: Bytes) -> Result<(RecordHeader, Bytes)> {
    if frame.len() < 4 {
        return Err(CacheError::Corrupted("record shorter than its length prefix".into()));
    }
    let header_len = frame.get_u32() as usize;
    if frame.len() < header_len {
        return Err(CacheError::Corrupted(format!(
            "header length {} exceeds record length {}",
            header_len,
            frame.len()
        )));
    }
    let header_bytes = frame.split_to(header_len);
    let header: RecordHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| CacheError::Corrupted(e.to_string()))?;
    Ok((header, frame))
}

fn decode_record(frame: Bytes, codec: &CompressionCodec) -> Result<MemoryEntry> {
    let (header, payload) = decode_header(frame)?;
    let data = codec.decode_sized(&payload, header.compressed, header.size)?;
    Ok(CacheEntry {
        data,
        timestamp: header.timestamp,
        ttl: header.ttl,
        size: header.size,
        hit_count: header.hit_count,
        last_accessed: header.last_accessed,
        query_pattern: header.query_pattern,
        dependencies: header.dependencies,
        generation: 0,
        access_seq: 0,
    })
}

// == Persistent Store ==
/// Adapter over a preferred durable backend and a flat fallback backend.
pub struct PersistentStore {
    preferred: Option<Arc<dyn StorageBackend>>,
    fallback: Arc<dyn StorageBackend>,
    codec: CompressionCodec,
    timeout: Duration,
    max_storage_size: u64,
}

impl PersistentStore {
    pub fn new(
        preferred: Option<Arc<dyn StorageBackend>>,
        fallback: Arc<dyn StorageBackend>,
        codec: CompressionCodec,
        timeout: Duration,
        max_storage_size: u64,
    ) -> Self {
        Self {
            preferred,
            fallback,
            codec,
            timeout,
            max_storage_size,
        }
    }

    pub fn has_preferred(&self) -> bool {
        self.preferred.is_some()
    }

    fn backends(&self) -> impl Iterator<Item = &Arc<dyn StorageBackend>> {
        self.preferred.iter().chain(std::iter::once(&self.fallback))
    }

    async fn bounded<T>(
        &self,
        backend: &dyn StorageBackend,
        op: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                backend: backend.name().to_string(),
                millis: self.timeout.as_millis() as u64,
            }),
        }
    }

    async fn write_to(&self, backend: &dyn StorageBackend, key: &str, frame: Bytes) -> Result<()> {
        let stored = self.bounded(backend, backend.stored_bytes()).await?;
        let needed = stored + frame.len() as u64;
        if needed > self.max_storage_size {
            return Err(CacheError::QuotaExceeded {
                backend: backend.name().to_string(),
                needed,
                limit: self.max_storage_size,
            });
        }
        self.bounded(backend, backend.put(key, frame)).await
    }

    // == Put ==
    /// Compresses and writes an entry; never fails the caller.
    pub async fn put(&self, key: &str, entry: &MemoryEntry) -> TierOutcome<()> {
        let encoded = self.codec.encode_bytes(entry.data.clone());
        let frame = match encode_record(entry, &encoded) {
            Ok(frame) => frame,
            Err(e) => return TierOutcome::Failed(e.to_string()),
        };

        let mut quota_only = true;
        if let Some(preferred) = &self.preferred {
            match self.write_to(preferred.as_ref(), key, frame.clone()).await {
                Ok(()) => {
                    // drop any older copy a previous fallback write left behind
                    self.discard_copy(self.fallback.as_ref(), key).await;
                    return TierOutcome::Preferred(());
                }
                Err(e) => {
                    quota_only = matches!(e, CacheError::QuotaExceeded { .. });
                    tracing::warn!("Persistent write to {} failed, falling back: {}", preferred.name(), e);
                }
            }
        }

        match self.write_to(self.fallback.as_ref(), key, frame).await {
            Ok(()) => {
                // reads try the preferred backend first, so its older copy must go
                if let Some(preferred) = &self.preferred {
                    self.discard_copy(preferred.as_ref(), key).await;
                }
                TierOutcome::FellBack(())
            }
            Err(CacheError::QuotaExceeded { .. }) if quota_only => {
                tracing::debug!("Persistent tier full, skipping {}", key);
                TierOutcome::Skipped
            }
            Err(e) => {
                tracing::warn!("Persistent write to {} failed: {}", self.fallback.name(), e);
                TierOutcome::Failed(e.to_string())
            }
        }
    }

    async fn discard_copy(&self, backend: &dyn StorageBackend, key: &str) {
        if let Err(e) = self.bounded(backend, backend.delete(key)).await {
            tracing::debug!("Could not drop older copy of {} in {}: {}", key, backend.name(), e);
        }
    }

    async fn read_from(&self, backend: &dyn StorageBackend, key: &str) -> Result<Option<MemoryEntry>> {
        let Some(frame) = self.bounded(backend, backend.get(key)).await? else {
            return Ok(None);
        };
        match decode_record(frame, &self.codec) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!("Dropping unreadable record {} in {}: {}", key, backend.name(), e);
                let _ = self.bounded(backend, backend.delete(key)).await;
                Ok(None)
            }
        }
    }

    // == Get ==
    /// Reads and decompresses an entry, preferred backend first.
    pub async fn get(&self, key: &str) -> TierOutcome<Option<MemoryEntry>> {
        if let Some(preferred) = &self.preferred {
            match self.read_from(preferred.as_ref(), key).await {
                Ok(Some(entry)) => return TierOutcome::Preferred(Some(entry)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Persistent read from {} failed, falling back: {}", preferred.name(), e)
                }
            }
        }

        match self.read_from(self.fallback.as_ref(), key).await {
            Ok(found) => TierOutcome::FellBack(found),
            Err(e) => {
                tracing::warn!("Persistent read from {} failed: {}", self.fallback.name(), e);
                TierOutcome::Failed(e.to_string())
            }
        }
    }

    // == Delete ==
    /// Deletes a key from every backend.
    pub async fn delete(&self, key: &str) -> BackendReport {
        let mut report = BackendReport::default();
        for backend in self.backends() {
            match self.bounded(backend.as_ref(), backend.delete(key)).await {
                Ok(true) => report.removed += 1,
                Ok(false) => {}
                Err(e) => report.failures.push(format!("{}: {}", backend.name(), e)),
            }
        }
        report
    }

    // == Clear ==
    /// Empties every backend; a failing backend does not stop the others.
    pub async fn clear(&self) -> BackendReport {
        let mut report = BackendReport::default();
        for backend in self.backends() {
            match self.bounded(backend.as_ref(), backend.clear()).await {
                Ok(count) => report.removed += count,
                Err(e) => report.failures.push(format!("{}: {}", backend.name(), e)),
            }
        }
        report
    }

    // == Remove Matching ==
    /// Deletes every record whose stored query pattern matches `pattern`.
    pub async fn remove_matching(&self, pattern: &str) -> BackendReport {
        let mut report = BackendReport::default();
        for backend in self.backends() {
            let (removed, error) = self.remove_matching_in(backend.as_ref(), pattern).await;
            report.removed += removed;
            if let Some(e) = error {
                report.failures.push(format!("{}: {}", backend.name(), e));
            }
        }
        report
    }

    /// Scans one backend, stopping at its first error. Records deleted
    /// before the error are still counted.
    async fn remove_matching_in(
        &self,
        backend: &dyn StorageBackend,
        pattern: &str,
    ) -> (usize, Option<CacheError>) {
        let keys = match self.bounded(backend, backend.keys()).await {
            Ok(keys) => keys,
            Err(e) => return (0, Some(e)),
        };

        let mut removed = 0;
        for key in keys {
            match self.remove_if_matching(backend, &key, pattern).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => return (removed, Some(e)),
            }
        }
        (removed, None)
    }

    async fn remove_if_matching(
        &self,
        backend: &dyn StorageBackend,
        key: &str,
        pattern: &str,
    ) -> Result<bool> {
        let Some(frame) = self.bounded(backend, backend.get(key)).await? else {
            return Ok(false);
        };
        let hit = match decode_header(frame) {
            Ok((header, _)) => matches(&header.query_pattern, pattern),
            Err(_) => false,
        };
        if !hit {
            return Ok(false);
        }
        self.bounded(backend, backend.delete(key)).await
    }

    /// Bytes held across all reachable backends.
    pub async fn stored_bytes(&self) -> u64 {
        let mut total = 0;
        for backend in self.backends() {
            if let Ok(bytes) = self.bounded(backend.as_ref(), backend.stored_bytes()).await {
                total += bytes;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::MemoryBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Backend that fails every call.
    struct BrokenBackend;

    #[async_trait]
    impl StorageBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }
        async fn get(&self, _key: &str) -> Result<Option<Bytes>> {
            Err(CacheError::Internal("unavailable".into()))
        }
        async fn put(&self, _key: &str, _data: Bytes) -> Result<()> {
            Err(CacheError::Internal("unavailable".into()))
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            Err(CacheError::Internal("unavailable".into()))
        }
        async fn clear(&self) -> Result<usize> {
            Err(CacheError::Internal("unavailable".into()))
        }
        async fn keys(&self) -> Result<Vec<String>> {
            Err(CacheError::Internal("unavailable".into()))
        }
        async fn stored_bytes(&self) -> Result<u64> {
            Ok(0)
        }
    }

    /// Backend that never answers.
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

    /// Memory backend whose writes or reads can be switched to fail.
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        fail_puts: AtomicBool,
        fail_get_of: parking_lot::Mutex<Option<String>>,
    }

    #[async_trait]
    impl StorageBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn get(&self, key: &str) -> Result<Option<Bytes>> {
            if self.fail_get_of.lock().as_deref() == Some(key) {
                return Err(CacheError::Internal("io".into()));
            }
            self.inner.get(key).await
        }
        async fn put(&self, key: &str, data: Bytes) -> Result<()> {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(CacheError::Internal("io".into()));
            }
            self.inner.put(key, data).await
        }
        async fn delete(&self, key: &str) -> Result<bool> {
            self.inner.delete(key).await
        }
        async fn clear(&self) -> Result<usize> {
            self.inner.clear().await
        }
        async fn keys(&self) -> Result<Vec<String>> {
            // sorted so a test can tell which key is scanned first
            let mut keys = self.inner.keys().await?;
            keys.sort();
            Ok(keys)
        }
        async fn stored_bytes(&self) -> Result<u64> {
            self.inner.stored_bytes().await
        }
    }

    fn entry(pattern: &str, data: &[u8]) -> MemoryEntry {
        CacheEntry::new(
            Bytes::copy_from_slice(data),
            data.len(),
            Duration::from_secs(60),
            pattern.to_string(),
            vec!["mrr:*".to_string()],
        )
    }

    fn store(
        preferred: Option<Arc<dyn StorageBackend>>,
        fallback: Arc<dyn StorageBackend>,
    ) -> PersistentStore {
        PersistentStore::new(
            preferred,
            fallback,
            CompressionCodec::new(64),
            Duration::from_millis(100),
            1024 * 1024,
        )
    }

    #[test]
    fn test_record_framing_roundtrip() {
        let codec = CompressionCodec::new(8);
        let original = entry("deals:*", &[b'z'; 256]);
        let encoded = codec.encode_bytes(original.data.clone());
        assert!(encoded.compressed);

        let frame = encode_record(&original, &encoded).unwrap();
        let restored = decode_record(frame, &codec).unwrap();

        assert_eq!(restored.data, original.data);
        assert_eq!(restored.query_pattern, "deals:*");
        assert_eq!(restored.dependencies, original.dependencies);
        assert_eq!(restored.size, 256);
        assert_eq!(restored.timestamp, original.timestamp);
    }

    #[test]
    fn test_truncated_frame_is_corrupted() {
        assert!(matches!(
            decode_header(Bytes::from_static(&[0, 0])),
            Err(CacheError::Corrupted(_))
        ));
        assert!(matches!(
            decode_header(Bytes::from_static(&[0, 0, 0, 9, b'{'])),
            Err(CacheError::Corrupted(_))
        ));
    }

    #[test]
    fn test_record_with_inflated_size_prefix_is_rejected() {
        let codec = CompressionCodec::new(8);
        let original = entry("deals:*", &[b'z'; 256]);
        let mut encoded = codec.encode_bytes(original.data.clone());

        let mut payload = encoded.payload.to_vec();
        payload[..4].copy_from_slice(&0x7fff_fff0u32.to_le_bytes());
        encoded.payload = Bytes::from(payload);

        let frame = encode_record(&original, &encoded).unwrap();
        assert!(matches!(
            decode_record(frame, &codec),
            Err(CacheError::Decompression(_))
        ));
    }

    #[tokio::test]
    async fn test_put_prefers_preferred_backend() {
        let preferred = Arc::new(MemoryBackend::new("preferred"));
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        let store = store(Some(preferred.clone()), fallback.clone());

        let outcome = store.put("k", &entry("deals:*", b"[1,2,3]")).await;
        assert_eq!(outcome, TierOutcome::Preferred(()));
        assert_eq!(preferred.len(), 1);
        assert!(fallback.is_empty());

        let found = store.get("k").await;
        assert!(matches!(found, TierOutcome::Preferred(Some(_))));
    }

    #[tokio::test]
    async fn test_put_falls_back_when_preferred_fails() {
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        let store = store(Some(Arc::new(BrokenBackend)), fallback.clone());

        let outcome = store.put("k", &entry("deals:*", b"[1]")).await;
        assert!(outcome.fell_back());
        assert_eq!(fallback.len(), 1);

        let found = store.get("k").await.into_value().flatten().unwrap();
        assert_eq!(found.data, Bytes::from_static(b"[1]"));
    }

    #[tokio::test]
    async fn test_fallback_write_replaces_preferred_copy() {
        let preferred = Arc::new(FlakyBackend::default());
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        let store = store(Some(preferred.clone()), fallback.clone());

        assert_eq!(store.put("k", &entry("a", b"\"v1\"")).await, TierOutcome::Preferred(()));
        preferred.fail_puts.store(true, Ordering::SeqCst);
        assert!(store.put("k", &entry("a", b"\"v2\"")).await.fell_back());

        assert!(preferred.inner.is_empty());
        let found = store.get("k").await.into_value().flatten().unwrap();
        assert_eq!(found.data, Bytes::from_static(b"\"v2\""));

        // once the preferred backend recovers the fallback copy is dropped
        preferred.fail_puts.store(false, Ordering::SeqCst);
        assert_eq!(store.put("k", &entry("a", b"\"v3\"")).await, TierOutcome::Preferred(()));
        assert!(fallback.is_empty());
        let found = store.get("k").await.into_value().flatten().unwrap();
        assert_eq!(found.data, Bytes::from_static(b"\"v3\""));
    }

    #[tokio::test]
    async fn test_fallback_only_mode() {
        let store = store(None, Arc::new(MemoryBackend::default()));
        assert!(!store.has_preferred());

        assert!(store.put("k", &entry("a", b"1")).await.fell_back());
        assert!(store.get("k").await.into_value().flatten().is_some());
        assert_eq!(store.get("missing").await, TierOutcome::FellBack(None));
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_fallback() {
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        let store = store(Some(Arc::new(StalledBackend)), fallback.clone());

        assert!(store.put("k", &entry("a", b"1")).await.fell_back());
        assert!(store.get("k").await.into_value().flatten().is_some());
    }

    #[tokio::test]
    async fn test_quota_overflow_skips_write() {
        let store = PersistentStore::new(
            None,
            Arc::new(MemoryBackend::default()),
            CompressionCodec::new(1024),
            Duration::from_millis(100),
            16,
        );

        let outcome = store.put("k", &entry("a", &[b'x'; 64])).await;
        assert_eq!(outcome, TierOutcome::Skipped);
        assert_eq!(store.stored_bytes().await, 0);
    }

    #[tokio::test]
    async fn test_quota_on_preferred_falls_back() {
        let preferred = Arc::new(MemoryBackend::new("preferred"));
        preferred.put("filler", Bytes::from(vec![0u8; 900])).await.unwrap();
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        let store = PersistentStore::new(
            Some(preferred),
            fallback.clone(),
            CompressionCodec::new(4096),
            Duration::from_millis(100),
            1000,
        );

        assert!(store.put("k", &entry("a", &[b'x'; 200])).await.fell_back());
        assert_eq!(fallback.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_matching_across_backends() {
        let preferred = Arc::new(MemoryBackend::new("preferred"));
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        let store = store(Some(preferred.clone()), fallback.clone());

        store.put("a", &entry("company:c1", b"1")).await;
        store.put("b", &entry("deals:company:c1", b"2")).await;
        let stray = entry("company:c2", b"3");
        let encoded = CompressionCodec::new(64).encode_bytes(stray.data.clone());
        fallback
            .put("c", encode_record(&stray, &encoded).unwrap())
            .await
            .unwrap();

        let report = store.remove_matching("company:*").await;
        assert_eq!(report.removed, 2);
        assert!(report.failures.is_empty());
        assert_eq!(preferred.len(), 1);
        assert!(fallback.is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported() {
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        let store = store(Some(Arc::new(BrokenBackend)), fallback.clone());
        store.put("a", &entry("company:c1", b"1")).await;

        let report = store.remove_matching("company:*").await;
        assert_eq!(report.removed, 1);
        assert_eq!(report.failures.len(), 1);

        store.put("b", &entry("x", b"1")).await;
        let report = store.clear().await;
        assert_eq!(report.removed, 1);
        assert_eq!(report.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_failure_keeps_removed_count() {
        let preferred = Arc::new(FlakyBackend::default());
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        let store = store(Some(preferred.clone()), fallback);

        store.put("c1", &entry("company:c1", b"1")).await;
        store.put("c2", &entry("company:c2", b"2")).await;
        *preferred.fail_get_of.lock() = Some("c2".to_string());

        let report = store.remove_matching("company:*").await;
        assert_eq!(report.removed, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].starts_with("flaky:"));
        assert_eq!(preferred.inner.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_miss() {
        let fallback = Arc::new(MemoryBackend::new("fallback"));
        fallback.put("k", Bytes::from_static(b"garbage")).await.unwrap();
        let store = store(None, fallback.clone());

        assert_eq!(store.get("k").await, TierOutcome::FellBack(None));
        assert!(fallback.is_empty());
    }
}
