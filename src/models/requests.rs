//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies. Field names are
//! camelCase on the wire.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::QueryParams;

/// Maximum accepted length of a query type or pattern
const MAX_NAME_LENGTH: usize = 256;

fn validate_name(field: &str, value: &str) -> Option<String> {
    if value.is_empty() {
        return Some(format!("{} cannot be empty", field));
    }
    if value.len() > MAX_NAME_LENGTH {
        return Some(format!(
            "{} exceeds maximum length of {} characters",
            field, MAX_NAME_LENGTH
        ));
    }
    None
}

/// Request body for POST /cache/get
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRequest {
    /// Query type, e.g. `deals:list`
    pub query_type: String,
    /// Query parameters; order is irrelevant
    #[serde(default)]
    pub params: QueryParams,
}

impl GetRequest {
    pub fn validate(&self) -> Option<String> {
        validate_name("queryType", &self.query_type)
    }
}

/// Request body for PUT /cache/set
///
/// # Fields
/// - `queryType`: The query type the result belongs to
/// - `params`: The query parameters
/// - `data`: The query result to cache
/// - `ttl`: Optional TTL in milliseconds (uses default if not specified)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRequest {
    pub query_type: String,
    #[serde(default)]
    pub params: QueryParams,
    pub data: Value,
    /// Optional TTL in milliseconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if let Some(error) = validate_name("queryType", &self.query_type) {
            return Some(error);
        }
        if self.ttl == Some(0) {
            return Some("ttl must be greater than zero".to_string());
        }
        None
    }
}

/// Request body for POST /cache/invalidate
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Exact pattern, or a prefix ending in `*`
    pub pattern: String,
    /// Also invalidate the pattern's dependency targets
    #[serde(default)]
    pub cascade: bool,
}

impl InvalidateRequest {
    pub fn validate(&self) -> Option<String> {
        validate_name("pattern", &self.pattern)
    }
}
