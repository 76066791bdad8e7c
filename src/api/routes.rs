//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, get_handler, health_handler, invalidate_handler, metrics_handler, set_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /cache/get` - Look up a query result
/// - `PUT /cache/set` - Store a query result
/// - `POST /cache/invalidate` - Remove entries by pattern
/// - `DELETE /cache` - Empty every tier
/// - `GET /metrics` - Raw metrics snapshot
/// - `GET /stats` - Derived statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/cache/get", post(get_handler))
        .route("/cache/set", put(set_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/cache", delete(clear_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
