//! Swarm coordinator: the dispatch loop.
//!
//! Drains the task queue with bounded concurrency equal to the pool
//! size. Each execution is an independent tokio task tracked in a
//! `JoinSet`; queue bookkeeping stays in this loop so the queue has a
//! single writer. The loop waits on the first of {an in-flight
//! settlement, a 100 ms idle tick} to stay responsive without spinning.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::FutureExt;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::task_queue::{QueueStats, TaskQueue};
use crate::application::worker_pool::WorkerPool;
use crate::domain::error::WorkerError;
use crate::domain::models::{
    RetryPolicy, SwarmEvent, SwarmResult, SwarmTask, WorkerResult, WorkerStatus,
};

const IDLE_TICK: Duration = Duration::from_millis(100);

type Settlement = (SwarmTask, String, Result<WorkerResult, WorkerError>);

/// Coordinates task dispatch across the worker pool.
pub struct SwarmCoordinator {
    queue: Mutex<TaskQueue>,
    pool: Arc<WorkerPool>,
    retry_policy: RetryPolicy,
    event_tx: broadcast::Sender<SwarmEvent>,
    stopping: AtomicBool,
    aborted: AtomicBool,
}

impl SwarmCoordinator {
    pub fn new(pool: Arc<WorkerPool>, retry_policy: RetryPolicy) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            queue: Mutex::new(TaskQueue::new()),
            pool,
            retry_policy,
            event_tx,
            stopping: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
        }
    }

    /// Queue a task. Malformed descriptors are rejected before entry.
    pub async fn add_task(&self, task: SwarmTask) -> Result<()> {
        self.queue.lock().await.add_task(task)?;
        Ok(())
    }

    /// Queue a batch of tasks; fails fast on the first malformed one.
    pub async fn add_tasks(&self, tasks: Vec<SwarmTask>) -> Result<()> {
        self.queue.lock().await.add_tasks(tasks)?;
        Ok(())
    }

    /// Cancel a still-pending task. Returns false once it left pending.
    pub async fn cancel_task(&self, id: &str) -> bool {
        self.queue.lock().await.cancel_task(id)
    }

    pub async fn get_stats(&self) -> QueueStats {
        self.queue.lock().await.get_stats()
    }

    pub async fn get_all_workers(&self) -> Vec<WorkerStatus> {
        self.pool.get_all_statuses().await
    }

    /// Subscribe to the lifecycle event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.event_tx.subscribe()
    }

    /// Stop dispatching new tasks; in-flight executions finish normally.
    pub fn stop(&self) {
        info!("Coordinator stop requested");
        self.stopping.store(true, Ordering::SeqCst);
    }

    /// Abort immediately: kill every worker and record in-flight tasks
    /// as failures. Already-settled results are preserved.
    pub async fn abort(&self) {
        warn!("Coordinator abort requested");
        self.aborted.store(true, Ordering::SeqCst);
        self.pool.kill_all().await;
    }

    fn emit(&self, event: SwarmEvent) {
        // No subscribers is fine; events are observability, not control.
        let _ = self.event_tx.send(event);
    }

    /// Drive the queue to completion and assemble the run summary.
    ///
    /// Task-level failures never surface as `Err` here; they land in
    /// `SwarmResult::failed_tasks`.
    pub async fn run(&self, concurrency: Option<usize>) -> Result<SwarmResult> {
        if let Some(n) = concurrency {
            self.pool.resize(n).await;
        }
        self.stopping.store(false, Ordering::SeqCst);
        self.aborted.store(false, Ordering::SeqCst);

        let run_id = Uuid::new_v4();
        let start = Instant::now();
        let mut skipped_total = 0usize;
        let mut inflight: JoinSet<Settlement> = JoinSet::new();
        let mut inflight_ids: HashSet<String> = HashSet::new();

        let pool_size = self.pool.size().await;
        info!(%run_id, pool_size, "Swarm run starting");

        // Dependency failures can pre-exist any dispatch (e.g. a task
        // depending on an id that already failed in a prior pass).
        skipped_total += self.propagate_blocked().await;

        loop {
            if self.aborted.load(Ordering::SeqCst) {
                break;
            }

            skipped_total += self.propagate_blocked().await;
            self.dispatch_ready(&mut inflight, &mut inflight_ids).await;

            let queue_done = self.queue.lock().await.is_done();
            if inflight.is_empty()
                && (queue_done || self.stopping.load(Ordering::SeqCst))
            {
                break;
            }

            tokio::select! {
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    match joined {
                        Ok(settlement) => {
                            inflight_ids.remove(&settlement.0.id);
                            self.settle(settlement).await?;
                        }
                        Err(join_err) => {
                            // The closure releases its worker before
                            // returning, so the pool stays intact even
                            // here; the task id is reconciled on abort.
                            error!(error = %join_err, "Execution task failed to join");
                        }
                    }
                }
                () = tokio::time::sleep(IDLE_TICK) => {}
            }
        }

        if self.aborted.load(Ordering::SeqCst) {
            self.drain_aborted(&mut inflight, &mut inflight_ids).await?;
        }

        let result = self.assemble_result(start.elapsed(), skipped_total).await;
        info!(
            %run_id,
            total = result.total,
            completed = result.completed,
            failed = result.failed,
            skipped = result.skipped,
            "Swarm run finished"
        );
        self.emit(SwarmEvent::SwarmComplete {
            result: result.clone(),
        });
        Ok(result)
    }

    /// Fail pending tasks whose dependencies failed; emits their
    /// terminal events. Returns how many were skipped.
    async fn propagate_blocked(&self) -> usize {
        let skipped = self.queue.lock().await.skip_blocked_tasks();
        for id in &skipped {
            self.emit(SwarmEvent::TaskFail {
                task_id: id.clone(),
                error: "Skipped due to failed dependency".to_string(),
            });
        }
        skipped.len()
    }

    /// Launch ready tasks while a worker is available.
    async fn dispatch_ready(
        &self,
        inflight: &mut JoinSet<Settlement>,
        inflight_ids: &mut HashSet<String>,
    ) {
        while !self.stopping.load(Ordering::SeqCst) && !self.aborted.load(Ordering::SeqCst) {
            let Some(worker) = self.pool.get_worker().await else {
                break;
            };
            let (task, attempt) = {
                let mut queue = self.queue.lock().await;
                match queue.get_next_task() {
                    Some(task) => {
                        let attempt = queue.attempts(&task.id).unwrap_or(0);
                        (task, attempt)
                    }
                    None => {
                        drop(queue);
                        self.pool.release_worker(&worker).await;
                        return;
                    }
                }
            };

            if attempt > 0 {
                self.emit(SwarmEvent::TaskRetry {
                    task_id: task.id.clone(),
                    attempt,
                });
            }
            self.emit(SwarmEvent::TaskStart {
                task_id: task.id.clone(),
                worker_id: worker.id().to_string(),
            });
            debug!(task_id = %task.id, worker_id = %worker.id(), "Dispatching task");

            inflight_ids.insert(task.id.clone());
            let pool = Arc::clone(&self.pool);
            inflight.spawn(async move {
                let worker_id = worker.id().to_string();
                // catch_unwind keeps the release unconditional: a
                // panicking worker must not strand its pool slot.
                let outcome = std::panic::AssertUnwindSafe(worker.execute(&task))
                    .catch_unwind()
                    .await;
                pool.release_worker(&worker).await;
                let result = match outcome {
                    Ok(result) => result,
                    Err(_) => Err(WorkerError::Execution(
                        "worker panicked during execution".to_string(),
                    )),
                };
                (task, worker_id, result)
            });
        }
    }

    /// Apply one settled execution to the queue and emit its events.
    async fn settle(&self, (task, worker_id, outcome): Settlement) -> Result<()> {
        let mut queue = self.queue.lock().await;
        match outcome {
            Ok(result) if result.success => {
                queue.complete_task(&task.id, &worker_id, result)?;
                drop(queue);
                debug!(task_id = %task.id, %worker_id, "Task completed");
                self.emit(SwarmEvent::TaskComplete {
                    task_id: task.id,
                    worker_id,
                });
            }
            other => {
                let error = match other {
                    Ok(result) => result
                        .error
                        .unwrap_or_else(|| "worker reported failure".to_string()),
                    Err(e) => e.to_string(),
                };
                let will_retry =
                    queue.fail_task(&task.id, &error, self.retry_policy.max_retries)?;
                drop(queue);
                if will_retry {
                    debug!(task_id = %task.id, %error, "Task failed, requeued");
                    // TaskRetry fires when the task is dispatched again.
                } else {
                    warn!(task_id = %task.id, %error, "Task failed terminally");
                    self.emit(SwarmEvent::TaskFail {
                        task_id: task.id,
                        error,
                    });
                }
            }
        }
        Ok(())
    }

    /// After an abort, settle whatever the kill produced and record
    /// anything still unaccounted for as a terminal failure.
    async fn drain_aborted(
        &self,
        inflight: &mut JoinSet<Settlement>,
        inflight_ids: &mut HashSet<String>,
    ) -> Result<()> {
        while let Ok(Some(joined)) =
            tokio::time::timeout(Duration::from_secs(1), inflight.join_next()).await
        {
            if let Ok((task, worker_id, outcome)) = joined {
                inflight_ids.remove(&task.id);
                let error = match outcome {
                    Ok(result) if result.success => {
                        // Settled before the kill landed; keep it.
                        let mut queue = self.queue.lock().await;
                        queue.complete_task(&task.id, &worker_id, result)?;
                        continue;
                    }
                    Ok(result) => result
                        .error
                        .unwrap_or_else(|| "aborted by caller".to_string()),
                    Err(_) => "aborted by caller".to_string(),
                };
                // max_retries 0 forces the terminal path.
                self.queue.lock().await.fail_task(&task.id, &error, 0)?;
                self.emit(SwarmEvent::TaskFail {
                    task_id: task.id,
                    error,
                });
            }
        }
        inflight.abort_all();

        // Anything that never settled (cancelled join) still needs a record.
        let remaining: Vec<String> = inflight_ids.drain().collect();
        for id in remaining {
            self.queue
                .lock()
                .await
                .fail_task(&id, "aborted by caller", 0)?;
            self.emit(SwarmEvent::TaskFail {
                task_id: id,
                error: "aborted by caller".to_string(),
            });
        }
        Ok(())
    }

    async fn assemble_result(&self, duration: Duration, skipped: usize) -> SwarmResult {
        let queue = self.queue.lock().await;
        let stats = queue.get_stats();
        let results = queue.get_results().to_vec();
        let failed_tasks = queue.get_failures().to_vec();
        let completed = results.len();
        let failed = failed_tasks.len().saturating_sub(skipped);
        let success_rate = if stats.total == 0 {
            1.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            {
                completed as f64 / stats.total as f64
            }
        };
        SwarmResult {
            total: stats.total,
            completed,
            failed,
            skipped,
            duration,
            success_rate,
            results,
            failed_tasks,
        }
    }
}
