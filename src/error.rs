//! Error types for the query cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the query cache.
///
/// Only `Serialization` is surfaced by the public cache operations; the
/// persistent-tier variants are recovered locally and logged.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Value could not be encoded into its canonical byte form
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Compressor rejected the payload
    #[error("Compression failed: {0}")]
    Compression(String),

    /// Stored payload could not be restored
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// A storage backend reported an I/O or availability failure
    #[error("Backend '{backend}' failed: {reason}")]
    Backend { backend: String, reason: String },

    /// A storage backend did not answer within the configured bound
    #[error("Backend '{backend}' timed out after {millis}ms")]
    Timeout { backend: String, millis: u64 },

    /// A write would push a backend over its storage budget
    #[error("Backend '{backend}' quota exceeded: need {needed} bytes, limit {limit}")]
    QuotaExceeded {
        backend: String,
        needed: u64,
        limit: u64,
    },

    /// Persisted record framing is broken
    #[error("Corrupted record: {0}")]
    Corrupted(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Nothing cached for the request
    #[error("Not cached: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Backend {
            backend: "io".to_string(),
            reason: err.to_string(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::Serialization(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CacheError::QuotaExceeded { .. } | CacheError::Backend { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CacheError::Compression(_)
            | CacheError::Decompression(_)
            | CacheError::Corrupted(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the query cache.
pub type Result<T> = std::result::Result<T, CacheError>;
