//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::InvalidationReport;

/// Response body for POST /cache/get
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The derived cache key
    pub key: String,
    /// The cached query result
    pub data: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, data: Value) -> Self {
        Self {
            key: key.into(),
            data,
        }
    }
}

/// Response body for PUT /cache/set
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The derived cache key
    pub key: String,
    /// The query pattern the entry was filed under
    pub pattern: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>, pattern: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
            pattern: pattern.into(),
        }
    }
}

/// Response body for POST /cache/invalidate and DELETE /cache
#[derive(Debug, Clone, Serialize)]
pub struct RemovalResponse {
    /// Total entries removed across tiers
    pub removed: usize,
    #[serde(flatten)]
    pub report: InvalidationReport,
}

impl From<InvalidationReport> for RemovalResponse {
    fn from(report: InvalidationReport) -> Self {
        Self {
            removed: report.total(),
            report,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
