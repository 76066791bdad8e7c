//! Predictive Warming
//!
//! After a write the cache may notify an external collaborator that related
//! patterns are worth prefetching. The cache never prefetches itself.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::invalidation::{Rule, RuleTable};
use crate::error::Result;

/// Receives warm-up suggestions.
#[async_trait]
pub trait WarmupHook: Send + Sync {
    /// `observed` was just written; `targets` are the patterns to warm.
    async fn warm(&self, observed: &str, targets: Vec<String>) -> Result<()>;
}

/// Default `{observed -> patterns to warm}` table.
pub fn default_predictive_rules() -> RuleTable {
    RuleTable::new(vec![
        Rule::new("company:*", &["deals:company:*", "contacts:company:*"]),
        Rule::new("deals:company:*", &["company:*"]),
        Rule::new("deals:*", &["clients:deal:*", "payments:deal:*"]),
        Rule::new("clients:deal:*", &["payments:deal:*"]),
    ])
}

/// Fires the registered hook on a background task.
///
/// Errors and panics in the hook stay on that task and are only logged.
pub fn fire(hook: Arc<dyn WarmupHook>, observed: String, targets: Vec<String>) {
    if targets.is_empty() {
        return;
    }
    tokio::spawn(async move {
        if let Err(e) = hook.warm(&observed, targets).await {
            tracing::debug!("Warmup hook failed for {}: {}", observed, e);
        }
    });
}
