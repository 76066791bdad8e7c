//! Compression Codec
//!
//! Values are serialized to canonical JSON bytes, then LZ4-compressed when
//! they reach the configured threshold. Compression failures fall back to
//! the uncompressed bytes; data is never dropped to save space.
//!
//! # Example
//!
//! ```
//! use query_cache::cache::CompressionCodec;
//!
//! let codec = CompressionCodec::new(16);
//! let value = vec!["deal"; 64];
//!
//! let encoded = codec.encode(&value).unwrap();
//! assert!(encoded.compressed);
//!
//! let decoded: Vec<String> = codec.decode(&encoded.payload, encoded.compressed).unwrap();
//! assert_eq!(decoded, value);
//! ```

use std::sync::Arc;

use bytes::{Buf, Bytes};
use serde::{de::DeserializeOwned, Serialize};

use crate::cache::metrics::CacheMetrics;
use crate::error::{CacheError, Result};

/// Default LZ4 high-compression level.
const DEFAULT_LEVEL: i32 = 4;

// == Encoded Payload ==
/// Output of [`CompressionCodec::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// Bytes to persist
    pub payload: Bytes,
    /// Whether `payload` is LZ4 framed
    pub compressed: bool,
    /// Length of the canonical encoding before compression
    pub original_size: usize,
}

// == Canonical Form ==
/// Serializes a value to its canonical byte form.
pub fn to_canonical<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Restores a value from its canonical byte form.
pub fn from_canonical<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

// == Codec ==
/// LZ4 codec with a size threshold.
#[derive(Debug, Clone)]
pub struct CompressionCodec {
    threshold: usize,
    level: i32,
    metrics: Option<Arc<CacheMetrics>>,
}

impl CompressionCodec {
    /// Creates a codec that compresses payloads of at least `threshold` bytes.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            level: DEFAULT_LEVEL,
            metrics: None,
        }
    }

    /// Reports compression events to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<CacheMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    // == Encode ==
    /// Serializes and, above the threshold, compresses `value`.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Encoded> {
        Ok(self.encode_bytes(to_canonical(value)?))
    }

    /// Compresses already-canonical bytes.
    pub fn encode_bytes(&self, raw: Bytes) -> Encoded {
        let original_size = raw.len();
        if original_size < self.threshold {
            return Encoded {
                payload: raw,
                compressed: false,
                original_size,
            };
        }

        match self.compress(&raw) {
            Ok(compressed) if compressed.len() < original_size => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_compression(original_size, compressed.len());
                }
                Encoded {
                    payload: Bytes::from(compressed),
                    compressed: true,
                    original_size,
                }
            }
            Ok(_) => Encoded {
                payload: raw,
                compressed: false,
                original_size,
            },
            Err(e) => {
                tracing::warn!("Compression failed, storing uncompressed: {}", e);
                Encoded {
                    payload: raw,
                    compressed: false,
                    original_size,
                }
            }
        }
    }

    // == Decode ==
    /// Inverse of [`encode`](Self::encode).
    pub fn decode<T: DeserializeOwned>(&self, payload: &[u8], compressed: bool) -> Result<T> {
        let raw = self.decode_bytes(payload, compressed)?;
        from_canonical(&raw)
    }

    /// Restores the canonical bytes of a payload.
    pub fn decode_bytes(&self, payload: &[u8], compressed: bool) -> Result<Bytes> {
        if !compressed {
            return Ok(Bytes::copy_from_slice(payload));
        }
        self.decompress(payload, None)
    }

    /// Like [`decode_bytes`](Self::decode_bytes), but rejects a compressed
    /// payload whose declared length differs from `expected_size` before
    /// allocating for it.
    pub fn decode_sized(
        &self,
        payload: &[u8],
        compressed: bool,
        expected_size: usize,
    ) -> Result<Bytes> {
        if !compressed {
            return Ok(Bytes::copy_from_slice(payload));
        }
        self.decompress(payload, Some(expected_size))
    }

    fn decompress(&self, mut payload: &[u8], expected_size: Option<usize>) -> Result<Bytes> {
        if payload.len() < 4 {
            return Err(CacheError::Decompression("payload shorter than its size prefix".into()));
        }
        // lz4 prepends the decompressed length, little-endian
        let declared = payload.get_u32_le() as usize;
        if let Some(expected) = expected_size {
            if declared != expected {
                return Err(CacheError::Decompression(format!(
                    "size prefix {} does not match record size {}",
                    declared, expected
                )));
            }
        }
        let declared = i32::try_from(declared)
            .map_err(|_| CacheError::Decompression(format!("size prefix {} out of range", declared)))?;

        let raw = lz4::block::decompress(payload, Some(declared))
            .map_err(|e| CacheError::Decompression(e.to_string()))?;
        if raw.len() != declared as usize {
            return Err(CacheError::Decompression(format!(
                "decompressed {} bytes, expected {}",
                raw.len(),
                declared
            )));
        }
        Ok(Bytes::from(raw))
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(
            data,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| CacheError::Compression(e.to_string()))
    }
}
