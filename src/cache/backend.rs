//! Storage Backends
//!
//! Opaque key-value stores behind the persistent tier: a durable
//! file-per-key store and a flat in-memory store used as the fallback.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::{CacheError, Result};

/// Extension of files written by [`FileBackend`].
const ENTRY_EXTENSION: &str = "entry";

/// Storage backend trait
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Get a record
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Put a record, replacing any previous one
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Delete a record
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Delete every record, returning how many were removed
    async fn clear(&self) -> Result<usize>;

    /// List every stored key
    async fn keys(&self) -> Result<Vec<String>>;

    /// Total bytes currently stored
    async fn stored_bytes(&self) -> Result<u64>;
}

// =============================================================================
// Memory Backend
// =============================================================================

/// Flat in-process key-value store.
pub struct MemoryBackend {
    name: String,
    storage: DashMap<String, Bytes>,
    total_bytes: AtomicU64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            storage: DashMap::new(),
            total_bytes: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.storage.get(key).map(|data| data.clone()))
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let size = data.len() as u64;
        self.total_bytes.fetch_add(size, Ordering::Relaxed);
        if let Some(old) = self.storage.insert(key.to_string(), data) {
            self.total_bytes
                .fetch_sub(old.len() as u64, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match self.storage.remove(key) {
            Some((_, data)) => {
                self.total_bytes
                    .fetch_sub(data.len() as u64, Ordering::Relaxed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear(&self) -> Result<usize> {
        let count = self.storage.len();
        self.storage.clear();
        self.total_bytes.store(0, Ordering::Relaxed);
        Ok(count)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.storage.iter().map(|e| e.key().clone()).collect())
    }

    async fn stored_bytes(&self) -> Result<u64> {
        Ok(self.total_bytes.load(Ordering::Relaxed))
    }
}

// =============================================================================
// File Backend
// =============================================================================

/// Durable store writing one file per key.
///
/// File names are the URL-encoded key, so keys longer than the file system's
/// name limit fail to write and the caller falls back.
pub struct FileBackend {
    dir: PathBuf,
    /// Running size of all entry files, seeded by a scan on open
    total_bytes: AtomicU64,
}

impl FileBackend {
    /// Opens (and creates if needed) a store rooted at `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&e))?;

        let backend = Self {
            dir,
            total_bytes: AtomicU64::new(0),
        };
        let mut total = 0;
        for path in backend.entry_files().await? {
            total += file_len(&path).await;
        }
        backend.total_bytes.store(total, Ordering::Relaxed);
        Ok(backend)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", urlencoding::encode(key), ENTRY_EXTENSION))
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_error(&e))?;
        while let Some(item) = dir.next_entry().await.map_err(|e| io_error(&e))? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&e)),
        }
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        let old_len = file_len(&path).await;
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| io_error(&e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&e))?;

        self.total_bytes
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        self.total_bytes.fetch_sub(old_len, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key);
        let len = file_len(&path).await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.total_bytes.fetch_sub(len, Ordering::Relaxed);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&e)),
        }
    }

    async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_files().await? {
            let len = file_len(&path).await;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    removed += 1;
                    self.total_bytes.fetch_sub(len, Ordering::Relaxed);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(&e)),
            }
        }
        Ok(removed)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for path in self.entry_files().await? {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match urlencoding::decode(stem) {
                Ok(key) => keys.push(key.into_owned()),
                Err(e) => tracing::debug!("Skipping undecodable entry file {:?}: {}", path, e),
            }
        }
        Ok(keys)
    }

    async fn stored_bytes(&self) -> Result<u64> {
        Ok(self.total_bytes.load(Ordering::Relaxed))
    }
}

/// Length of a file, 0 when it does not exist.
async fn file_len(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0)
}

fn io_error(err: &std::io::Error) -> CacheError {
    CacheError::Backend {
        backend: "file".to_string(),
        reason: err.to_string(),
    }
}
