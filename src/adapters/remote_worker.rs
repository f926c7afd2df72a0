//! Remote worker that forwards tasks to a network agent over JSON-RPC.
//!
//! The connection is opened lazily on first use and survives across
//! tasks. Any transport failure drops it; the next execute reconnects.
//! The agent answers `run_task` with an MCP-style payload,
//! `{content: [{text}]}`, and the free text is mined for file changes
//! and a commit hash by the pluggable extractor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::adapters::rpc::{RpcClient, RpcError};
use crate::domain::error::WorkerError;
use crate::domain::models::{SwarmTask, WorkerResult, WorkerState, WorkerStatus};
use crate::domain::ports::{ResultExtractor, Worker};

pub struct RemoteWorker {
    id: String,
    endpoint: String,
    timeout_secs: Option<u64>,
    extractor: Arc<dyn ResultExtractor>,
    status: RwLock<WorkerStatus>,
    client: Mutex<Option<RpcClient>>,
}

impl RemoteWorker {
    pub fn new(
        id: impl Into<String>,
        endpoint: impl Into<String>,
        timeout_secs: Option<u64>,
        extractor: Arc<dyn ResultExtractor>,
    ) -> Self {
        let id = id.into();
        Self {
            status: RwLock::new(WorkerStatus::idle(&id)),
            id,
            endpoint: endpoint.into(),
            timeout_secs,
            extractor,
            client: Mutex::new(None),
        }
    }

    fn format_prompt(task: &SwarmTask) -> String {
        let mut prompt = task.description.clone();
        if !task.scope.files.is_empty() {
            prompt.push_str(&format!("\nFiles: {}", task.scope.files.join(", ")));
        }
        if !task.scope.directories.is_empty() {
            prompt.push_str(&format!(
                "\nDirectories: {}",
                task.scope.directories.join(", ")
            ));
        }
        if let Some(ref pattern) = task.scope.pattern {
            prompt.push_str(&format!("\nPattern: {pattern}"));
        }
        prompt
    }

    async fn run_task(&self, task: &SwarmTask) -> Result<String, WorkerError> {
        let mut guard = self.client.lock().await;
        let client = match guard.take() {
            Some(client) => guard.insert(client),
            None => {
                debug!(worker_id = %self.id, endpoint = %self.endpoint, "Connecting to remote agent");
                let client = RpcClient::connect(&self.endpoint).await.map_err(|e| {
                    WorkerError::Connection {
                        endpoint: self.endpoint.clone(),
                        message: e.to_string(),
                    }
                })?;
                guard.insert(client)
            }
        };

        let params = json!({
            "prompt": Self::format_prompt(task),
            "env": { "taskId": task.id },
        });
        let deadline = self.timeout_secs.map(Duration::from_secs);
        let response = match client.call("run_task", params, deadline).await {
            Ok(response) => response,
            Err(e @ (RpcError::Connection { .. } | RpcError::Timeout(_))) => {
                // The stream may hold a half-read reply; reconnect next time.
                warn!(worker_id = %self.id, error = %e, "Dropping remote agent connection");
                *guard = None;
                return Err(match e {
                    RpcError::Timeout(limit) => WorkerError::Timeout(limit.as_secs()),
                    other => WorkerError::Connection {
                        endpoint: self.endpoint.clone(),
                        message: other.to_string(),
                    },
                });
            }
            Err(e) => return Err(WorkerError::Execution(e.to_string())),
        };

        response
            .get("content")
            .and_then(Value::as_array)
            .and_then(|content| content.first())
            .and_then(|entry| entry.get("text"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| {
                WorkerError::Execution(format!(
                    "Remote agent returned no content text: {response}"
                ))
            })
    }
}

#[async_trait]
impl Worker for RemoteWorker {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, task: &SwarmTask) -> Result<WorkerResult, WorkerError> {
        {
            let mut status = self.status.write().await;
            if status.state == WorkerState::Running {
                return Err(WorkerError::Busy(self.id.clone()));
            }
            status.state = WorkerState::Running;
            status.current_task = Some(task.id.clone());
            status.started_at = Some(Utc::now());
            status.completed_at = None;
        }

        let start = Instant::now();
        let outcome = self.run_task(task).await;
        let duration = start.elapsed();

        let mut status = self.status.write().await;
        status.completed_at = Some(Utc::now());
        match outcome {
            Ok(text) => {
                status.state = WorkerState::Completed;
                drop(status);
                let changes = self.extractor.extract(&text);
                let mut result = WorkerResult::success(text, duration);
                result.files_changed = changes.files_changed;
                result.commit_hash = changes.commit_hash;
                Ok(result)
            }
            Err(e) => {
                status.state = WorkerState::Failed;
                Err(e)
            }
        }
    }

    async fn status(&self) -> WorkerStatus {
        self.status.read().await.clone()
    }

    async fn is_available(&self) -> bool {
        self.status.read().await.state.is_available()
    }

    async fn reset(&self) {
        let mut status = self.status.write().await;
        *status = WorkerStatus::idle(&self.id);
    }

    /// No remote process control exists here; the best this can do is
    /// sever the connection and refuse further work until reset.
    async fn kill(&self) {
        *self.client.lock().await = None;
        let mut status = self.status.write().await;
        status.state = WorkerState::Failed;
        status.completed_at = Some(Utc::now());
    }
}
