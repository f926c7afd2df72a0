//! Backlog snapshot reader.
//!
//! The external scheduler periodically writes a JSON snapshot with a
//! `pendingTasks` array. Only the count matters to scaling. A missing
//! or corrupt snapshot reads as zero with a warning: the scheduler may
//! simply not have written one yet, and a bad file must never take the
//! scaling loop down with it.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::application::scaling::BACKLOG_METRIC;
use crate::domain::ports::MetricSource;

#[derive(Debug, Deserialize)]
struct BacklogSnapshot {
    #[serde(rename = "pendingTasks", default)]
    pending_tasks: Vec<serde_json::Value>,
}

pub struct BacklogReader {
    path: PathBuf,
}

impl BacklogReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Number of pending tasks in the snapshot; zero when unreadable.
    pub async fn pending_count(&self) -> u64 {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Backlog snapshot unreadable");
                return 0;
            }
        };
        match serde_json::from_str::<BacklogSnapshot>(&raw) {
            Ok(snapshot) => {
                let count = snapshot.pending_tasks.len() as u64;
                debug!(path = %self.path.display(), count, "Backlog snapshot read");
                count
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Backlog snapshot corrupt");
                0
            }
        }
    }
}

#[async_trait]
impl MetricSource for BacklogReader {
    async fn value(&self, metric: &str) -> anyhow::Result<u64> {
        if metric != BACKLOG_METRIC {
            anyhow::bail!("BacklogReader only serves '{BACKLOG_METRIC}', got '{metric}'");
        }
        Ok(self.pending_count().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_counts_pending_tasks() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"pendingTasks": [{{"id": "a"}}, {{"id": "b"}}, {{"id": "c"}}]}}"#
        )
        .unwrap();
        file.flush().unwrap();
        let reader = BacklogReader::new(file.path());
        assert_eq!(reader.pending_count().await, 3);
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_zero() {
        let reader = BacklogReader::new("/nonexistent/backlog.json");
        assert_eq!(reader.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_zero() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json at all").unwrap();
        file.flush().unwrap();
        let reader = BacklogReader::new(file.path());
        assert_eq!(reader.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_metric_source_rejects_other_metrics() {
        let reader = BacklogReader::new("/nonexistent/backlog.json");
        assert!(reader.value("cpu-load").await.is_err());
        assert_eq!(reader.value(BACKLOG_METRIC).await.unwrap(), 0);
    }
}
