//! Dependency-aware in-memory task queue.
//!
//! A state machine over tasks (pending/running/completed/failed) with
//! attempt counting and result/failure accumulation. Single-writer: only
//! the coordinator mutates it while a run is active, so there is no
//! interior locking here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::TaskError;
use crate::domain::models::{FailedTask, SwarmTask, TaskResult, TaskState, WorkerResult};

/// Read-only counters over the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
struct QueueEntry {
    task: SwarmTask,
    state: TaskState,
    attempts: u32,
    /// Monotonic insertion sequence; breaks priority ties FIFO
    seq: u64,
}

/// In-memory dependency graph and state machine over tasks.
#[derive(Debug, Default)]
pub struct TaskQueue {
    entries: HashMap<String, QueueEntry>,
    results: Vec<TaskResult>,
    failures: Vec<FailedTask>,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task as pending with zero attempts.
    ///
    /// Re-adding an id already present overwrites the prior entry
    /// wholesale (last-write-wins): state back to pending, attempts
    /// reset, fresh insertion sequence, and any recorded result or
    /// failure for that id is dropped. This is an explicit contract,
    /// not an accident.
    pub fn add_task(&mut self, task: SwarmTask) -> Result<(), TaskError> {
        task.validate()?;
        let id = task.id.clone();
        if self.entries.contains_key(&id) {
            debug!(task_id = %id, "Re-adding existing task id, overwriting prior entry");
            self.results.retain(|r| r.task.id != id);
            self.failures.retain(|f| f.task.id != id);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            id,
            QueueEntry {
                task,
                state: TaskState::Pending,
                attempts: 0,
                seq,
            },
        );
        Ok(())
    }

    /// Insert a batch; fails fast on the first malformed descriptor.
    pub fn add_tasks(&mut self, tasks: Vec<SwarmTask>) -> Result<(), TaskError> {
        for task in tasks {
            self.add_task(task)?;
        }
        Ok(())
    }

    fn is_ready(&self, entry: &QueueEntry) -> bool {
        entry.state == TaskState::Pending
            && entry.task.dependencies.iter().all(|dep| {
                self.entries
                    .get(dep)
                    .is_some_and(|d| d.state == TaskState::Completed)
            })
    }

    fn select_ready(&self) -> Option<&QueueEntry> {
        self.entries
            .values()
            .filter(|e| self.is_ready(e))
            .min_by_key(|e| (e.task.priority, e.seq))
    }

    /// Pop the highest-precedence ready task (lowest priority number,
    /// insertion order breaking ties) and move it to running.
    pub fn get_next_task(&mut self) -> Option<SwarmTask> {
        let id = self.select_ready()?.task.id.clone();
        let entry = self.entries.get_mut(&id)?;
        entry.state = TaskState::Running;
        Some(entry.task.clone())
    }

    /// Same selection as [`get_next_task`](Self::get_next_task), without
    /// mutating.
    pub fn peek_next_task(&self) -> Option<&SwarmTask> {
        self.select_ready().map(|e| &e.task)
    }

    /// Move a running task to completed and record its result.
    pub fn complete_task(
        &mut self,
        id: &str,
        worker_id: &str,
        result: WorkerResult,
    ) -> Result<(), TaskError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| TaskError::TaskNotFound(id.to_string()))?;
        if entry.state != TaskState::Running {
            return Err(TaskError::InvalidStateTransition {
                task_id: id.to_string(),
                from: entry.state,
                to: TaskState::Completed,
            });
        }
        entry.state = TaskState::Completed;
        self.results.push(TaskResult {
            task: entry.task.clone(),
            worker_id: worker_id.to_string(),
            result,
        });
        Ok(())
    }

    /// Record a failed attempt.
    ///
    /// Increments the attempt counter; returns `Ok(true)` and requeues
    /// the task as pending while attempts remain under `max_retries`,
    /// otherwise moves it to terminal failed, records the failure, and
    /// returns `Ok(false)`.
    pub fn fail_task(
        &mut self,
        id: &str,
        error: &str,
        max_retries: u32,
    ) -> Result<bool, TaskError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| TaskError::TaskNotFound(id.to_string()))?;
        entry.attempts += 1;
        if entry.attempts < max_retries {
            entry.state = TaskState::Pending;
            debug!(task_id = %id, attempts = entry.attempts, "Task failed, will retry");
            Ok(true)
        } else {
            entry.state = TaskState::Failed;
            self.failures.push(FailedTask {
                task: entry.task.clone(),
                error: error.to_string(),
                attempts: entry.attempts,
            });
            debug!(task_id = %id, attempts = entry.attempts, "Task failed terminally");
            Ok(false)
        }
    }

    /// Move every pending task with a failed dependency straight to
    /// terminal failed, without consuming a worker slot or an attempt.
    ///
    /// Iterates to a fixpoint so whole dependency chains collapse in one
    /// call. Returns the skipped ids.
    pub fn skip_blocked_tasks(&mut self) -> Vec<String> {
        let mut skipped = Vec::new();
        loop {
            let blocked: Vec<String> = self
                .entries
                .values()
                .filter(|e| {
                    e.state == TaskState::Pending
                        && e.task.dependencies.iter().any(|dep| {
                            self.entries
                                .get(dep)
                                .is_some_and(|d| d.state == TaskState::Failed)
                        })
                })
                .map(|e| e.task.id.clone())
                .collect();
            if blocked.is_empty() {
                break;
            }
            for id in blocked {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.state = TaskState::Failed;
                    self.failures.push(FailedTask {
                        task: entry.task.clone(),
                        error: "Skipped due to failed dependency".to_string(),
                        attempts: 0,
                    });
                }
                skipped.push(id);
            }
        }
        skipped
    }

    /// Remove a pending task with no record kept. No-op (false) in any
    /// other state.
    pub fn cancel_task(&mut self, id: &str) -> bool {
        match self.entries.get(id) {
            Some(entry) if entry.state == TaskState::Pending => {
                self.entries.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Nothing pending and nothing running, regardless of how many tasks
    /// ended up failed.
    pub fn is_done(&self) -> bool {
        !self
            .entries
            .values()
            .any(|e| matches!(e.state, TaskState::Pending | TaskState::Running))
    }

    pub fn has_work(&self) -> bool {
        !self.is_done()
    }

    pub fn get_stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.entries.len(),
            ..QueueStats::default()
        };
        for entry in self.entries.values() {
            match entry.state {
                TaskState::Pending => stats.pending += 1,
                TaskState::Running => stats.running += 1,
                TaskState::Completed => stats.completed += 1,
                TaskState::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub fn get_results(&self) -> &[TaskResult] {
        &self.results
    }

    pub fn get_failures(&self) -> &[FailedTask] {
        &self.failures
    }

    /// Attempts consumed so far by a task, if it is known.
    pub fn attempts(&self, id: &str) -> Option<u32> {
        self.entries.get(id).map(|e| e.attempts)
    }

    /// Current state of a task, if it is known.
    pub fn state(&self, id: &str) -> Option<TaskState> {
        self.entries.get(id).map(|e| e.state)
    }
}
