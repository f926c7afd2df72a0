//! Worker-side result and status models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of a single `Worker::execute` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub success: bool,
    /// Paths the agent reported touching, best-effort
    #[serde(default)]
    pub files_changed: Vec<String>,
    /// Commit hash if the agent committed, best-effort
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    pub duration: Duration,
    /// Raw captured output (stdout or RPC response text)
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerResult {
    pub fn success(output: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: true,
            files_changed: Vec::new(),
            commit_hash: None,
            duration,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>, duration: Duration) -> Self {
        let error = error.into();
        Self {
            success: false,
            files_changed: Vec::new(),
            commit_hash: None,
            duration,
            output: String::new(),
            error: Some(error),
        }
    }
}

/// Lifecycle state of a single worker.
///
/// `idle -> running` on execute, `running -> completed|failed` on
/// settlement, back to `idle` via reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// A worker can accept a new task unless it is mid-execution.
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Point-in-time snapshot of a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub id: String,
    pub state: WorkerState,
    pub current_task: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkerStatus {
    pub fn idle(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: WorkerState::Idle,
            current_task: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Retry policy: total attempts allowed per task, including the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}
