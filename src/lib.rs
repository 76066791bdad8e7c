//! Query Cache - A multi-tier cache for query results
//!
//! A fast in-memory tier with LRU and TTL eviction in front of a
//! best-effort persistent tier, with LZ4 compression, pattern-based
//! invalidation and metrics. Also ships an HTTP service exposing the cache.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::TieredCache;
pub use config::{CacheConfig, CacheOverrides, Config};
pub use error::{CacheError, Result};
pub use tasks::spawn_sweep_task;
