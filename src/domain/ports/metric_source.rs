//! Metric-source port for the generalized scaling engine.

use async_trait::async_trait;

/// Resolves a named metric (e.g. "issue-backlog-by-label") to its
/// current value. A missing metric is an error; the rule engine logs it
/// and skips the rule for that tick.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn value(&self, metric: &str) -> anyhow::Result<u64>;
}
