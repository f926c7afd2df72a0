//! Scaling-rules file loader and the file-backed metric source.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::domain::models::ScalingRule;
use crate::domain::ports::MetricSource;

/// Load a JSON array of scaling rules. A malformed file is a hard
/// error; rules drive spawn/terminate and must not be half-applied.
pub async fn load_rules(path: impl AsRef<Path>) -> Result<Vec<ScalingRule>> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read rules file {}", path.display()))?;
    let rules: Vec<ScalingRule> = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed rules file {}", path.display()))?;
    for rule in &rules {
        if rule.agent_template.is_empty() {
            anyhow::bail!("Rule for metric '{}' has an empty agent_template", rule.metric);
        }
    }
    Ok(rules)
}

/// Metric source backed by a flat JSON object file
/// (`{"metric-name": value, ...}`), refreshed on every read.
pub struct FileMetricSource {
    path: PathBuf,
}

impl FileMetricSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MetricSource for FileMetricSource {
    async fn value(&self, metric: &str) -> Result<u64> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read metrics file {}", self.path.display()))?;
        let map: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed metrics file {}", self.path.display()))?;
        map.get(metric)
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                warn!(%metric, path = %self.path.display(), "Metric missing from metrics file");
                anyhow::anyhow!("Metric '{metric}' not present in {}", self.path.display())
            })
    }
}
