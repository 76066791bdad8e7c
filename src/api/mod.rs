//! API Module
//!
//! HTTP handlers and routing for the query cache REST API.
//!
//! # Endpoints
//! - `POST /cache/get` - Look up a query result
//! - `PUT /cache/set` - Store a query result
//! - `POST /cache/invalidate` - Remove entries by pattern
//! - `DELETE /cache` - Empty every tier
//! - `GET /metrics` - Raw metrics snapshot
//! - `GET /stats` - Derived statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
