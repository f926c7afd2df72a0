use thiserror::Error;

use super::models::task::TaskState;

/// Domain-level errors for queue operations.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Invalid task: {0}")]
    Validation(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid state transition from {from:?} to {to:?} for task {task_id}")]
    InvalidStateTransition {
        task_id: String,
        from: TaskState,
        to: TaskState,
    },
}

/// Errors surfaced by worker execution.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker {0} is already executing a task")]
    Busy(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Execution timed out after {0}s")]
    Timeout(u64),

    #[error("Connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },
}

impl WorkerError {
    /// Whether the failure counts against the task's retry budget.
    /// Every worker-side failure does; validation errors never reach here.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// Umbrella for domain-level errors.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}
