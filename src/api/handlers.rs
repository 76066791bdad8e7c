//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, Json};
use serde_json::Value;

use crate::cache::{CacheStats, MetricsSnapshot, TieredCache};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::models::{
    GetRequest, GetResponse, HealthResponse, InvalidateRequest, RemovalResponse, SetRequest,
    SetResponse,
};

/// Application state shared across all handlers.
///
/// The cache synchronizes internally, so handlers share it through a plain
/// `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<TieredCache>,
}

impl AppState {
    pub fn new(cache: TieredCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Opens a cache (including its durable store, if configured).
    pub async fn from_config(config: &CacheConfig) -> Self {
        Self::new(TieredCache::open(config.clone()).await)
    }
}

/// Handler for POST /cache/get
///
/// Looks up a cached query result.
pub async fn get_handler(
    State(state): State<AppState>,
    Json(req): Json<GetRequest>,
) -> Result<Json<GetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let key = state.cache.key_engine().build_key(&req.query_type, &req.params);
    match state.cache.get::<Value>(&req.query_type, &req.params).await {
        Some(data) => Ok(Json(GetResponse::new(key, data))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for PUT /cache/set
///
/// Stores a query result with an optional TTL in milliseconds.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl.map(Duration::from_millis);
    state
        .cache
        .set(&req.query_type, &req.params, &req.data, ttl)
        .await?;

    let keys = state.cache.key_engine();
    Ok(Json(SetResponse::new(
        keys.build_key(&req.query_type, &req.params),
        keys.derive_pattern(&req.query_type, &req.params),
    )))
}

/// Handler for POST /cache/invalidate
///
/// Removes entries by pattern, optionally following dependency rules.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<RemovalResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let report = if req.cascade {
        state.cache.invalidate_related(&req.pattern).await
    } else {
        state.cache.invalidate(&req.pattern).await
    };
    Ok(Json(report.into()))
}

/// Handler for DELETE /cache
///
/// Empties every tier. Cumulative counters are kept.
pub async fn clear_handler(State(state): State<AppState>) -> Json<RemovalResponse> {
    Json(state.cache.clear().await.into())
}

/// Handler for GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.cache.get_metrics())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.get_stats())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
