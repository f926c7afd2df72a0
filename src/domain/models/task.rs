//! Task domain model.
//!
//! Tasks are discrete units of work dispatched to workers. Priorities
//! order dispatch (1 is highest) and dependency edges form a DAG.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::error::TaskError;
use crate::domain::models::worker::WorkerResult;

/// State of a task in the queue.
///
/// A task is in exactly one state at any instant. `Completed` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Queued, dependencies may or may not be met yet
    Pending,
    /// Currently assigned to a worker
    Running,
    /// Finished successfully
    Completed,
    /// Exhausted retries or blocked by a failed dependency
    Failed,
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// File-system scope a worker is confined to while executing a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskScope {
    /// Individual files the task may touch
    #[serde(default)]
    pub files: Vec<String>,
    /// Directories the task may touch
    #[serde(default)]
    pub directories: Vec<String>,
    /// Optional glob pattern refining the scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl TaskScope {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty() && self.pattern.is_none()
    }
}

/// A discrete unit of work with priority and dependencies.
///
/// Immutable once queued; retries re-dispatch the same descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmTask {
    /// Unique identifier (caller-supplied)
    pub id: String,
    /// Natural-language instruction for the executing agent
    pub description: String,
    /// Dispatch priority, 1 is highest
    pub priority: i32,
    /// File-system scope for the execution
    #[serde(default)]
    pub scope: TaskScope,
    /// Ids of tasks that must complete before this one dispatches
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl SwarmTask {
    pub fn new(id: impl Into<String>, description: impl Into<String>, priority: i32) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            priority,
            scope: TaskScope::default(),
            dependencies: Vec::new(),
        }
    }

    /// Add a dependency edge. Self-edges and duplicates are ignored.
    pub fn with_dependency(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if task_id != self.id && !self.dependencies.contains(&task_id) {
            self.dependencies.push(task_id);
        }
        self
    }

    pub fn with_scope(mut self, scope: TaskScope) -> Self {
        self.scope = scope;
        self
    }

    /// Shape-check the descriptor before it enters the queue.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.id.trim().is_empty() {
            return Err(TaskError::Validation("task id cannot be empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(TaskError::Validation(format!(
                "task '{}' has an empty description",
                self.id
            )));
        }
        if self.priority < 1 {
            return Err(TaskError::Validation(format!(
                "task '{}' has priority {} (must be >= 1)",
                self.id, self.priority
            )));
        }
        if self.dependencies.iter().any(|d| d == &self.id) {
            return Err(TaskError::Validation(format!(
                "task '{}' cannot depend on itself",
                self.id
            )));
        }
        Ok(())
    }
}

/// Successful execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task: SwarmTask,
    pub worker_id: String,
    pub result: WorkerResult,
}

/// Terminal failure record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTask {
    pub task: SwarmTask,
    pub error: String,
    /// Attempts consumed; 0 for tasks skipped because a dependency failed
    pub attempts: u32,
}

/// Aggregate outcome of a full coordinator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmResult {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration: Duration,
    /// completed / total, in [0, 1]; 1.0 for an empty run
    pub success_rate: f64,
    pub results: Vec<TaskResult>,
    pub failed_tasks: Vec<FailedTask>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_validation_rejects_empty_id() {
        let task = SwarmTask::new("", "do something", 1);
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_task_validation_rejects_empty_description() {
        let task = SwarmTask::new("a", "   ", 1);
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_task_validation_rejects_bad_priority() {
        let task = SwarmTask::new("a", "do something", 0);
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_self_dependency_ignored_by_builder() {
        let task = SwarmTask::new("a", "do something", 1).with_dependency("a");
        assert!(task.dependencies.is_empty());
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_duplicate_dependency_ignored() {
        let task = SwarmTask::new("a", "do something", 1)
            .with_dependency("b")
            .with_dependency("b");
        assert_eq!(task.dependencies, vec!["b".to_string()]);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn test_task_descriptor_deserializes_from_caller_json() {
        let json = r#"{
            "id": "t1",
            "description": "refactor the parser",
            "priority": 2,
            "scope": {"files": ["src/parser.rs"], "directories": [], "pattern": "*.rs"},
            "dependencies": ["t0"]
        }"#;
        let task: SwarmTask = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, "t1");
        assert_eq!(task.scope.pattern.as_deref(), Some("*.rs"));
        assert_eq!(task.dependencies, vec!["t0".to_string()]);
    }

    #[test]
    fn test_scope_defaults_when_omitted() {
        let json = r#"{"id": "t1", "description": "x", "priority": 1}"#;
        let task: SwarmTask = serde_json::from_str(json).unwrap();
        assert!(task.scope.is_empty());
        assert!(task.dependencies.is_empty());
    }
}
