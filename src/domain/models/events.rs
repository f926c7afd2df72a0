//! Lifecycle events emitted by the coordinator.
//!
//! A tagged union over a broadcast channel instead of a string-keyed
//! emitter, so consumers can match exhaustively.

use serde::{Deserialize, Serialize};

use crate::domain::models::task::SwarmResult;

/// Coordinator lifecycle event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwarmEvent {
    /// A task was handed to a worker
    TaskStart { task_id: String, worker_id: String },
    /// A previously failed task was re-dispatched
    TaskRetry { task_id: String, attempt: u32 },
    /// A task reached `completed`
    TaskComplete { task_id: String, worker_id: String },
    /// A task reached terminal `failed` (retries exhausted or blocked)
    TaskFail { task_id: String, error: String },
    /// The run drained; carries the aggregated result
    SwarmComplete { result: SwarmResult },
}
