//! TTL Sweep Task
//!
//! Background task that periodically removes expired fast-tier entries.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TieredCache;

/// Spawns the periodic TTL sweep for `cache`.
///
/// The task holds only a weak reference, so it never keeps the cache alive.
/// It exits when the cache is disposed or dropped.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(TieredCache::new(CacheConfig::default()));
/// let sweep_handle = spawn_sweep_task(&cache);
/// // Later, during shutdown:
/// cache.dispose();
/// sweep_handle.await?;
/// ```
pub fn spawn_sweep_task(cache: &Arc<TieredCache>) -> JoinHandle<()> {
    let interval = cache.config().sweep_interval;
    let shutdown = cache.shutdown_token();
    let cache = Arc::downgrade(cache);

    tokio::spawn(async move {
        info!("Starting TTL sweep task with interval of {:?}", interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let Some(cache) = cache.upgrade() else {
                break;
            };
            let removed = cache.sweep_expired();
            drop(cache);

            if removed > 0 {
                info!("TTL sweep: removed {} expired entries", removed);
            } else {
                debug!("TTL sweep: no expired entries found");
            }
        }

        info!("TTL sweep task stopped");
    })
}
