//! Worker pool: a fixed collection of workers with an available/busy
//! partition.
//!
//! The partition is the one resource shared between the dispatch loop
//! and in-flight execution closures, so it lives behind a single lock.
//! A worker is in exactly one of {available, busy} at all times.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::models::WorkerStatus;
use crate::domain::ports::Worker;

/// Creates local workers on demand; used at construction and by
/// [`WorkerPool::resize`].
pub type LocalWorkerFactory = Box<dyn Fn(usize) -> Arc<dyn Worker> + Send + Sync>;

struct PoolInner {
    /// Local workers first, then one remote worker per endpoint
    workers: Vec<Arc<dyn Worker>>,
    busy: HashSet<String>,
    local_count: usize,
}

/// Fixed collection of N local workers plus one per remote endpoint.
pub struct WorkerPool {
    inner: Mutex<PoolInner>,
    local_factory: LocalWorkerFactory,
}

impl WorkerPool {
    /// Build a pool with `local_count` factory-made workers plus the
    /// given remote workers.
    pub fn new(
        local_count: usize,
        local_factory: LocalWorkerFactory,
        remote_workers: Vec<Arc<dyn Worker>>,
    ) -> Self {
        let mut workers: Vec<Arc<dyn Worker>> =
            (0..local_count).map(|i| local_factory(i)).collect();
        workers.extend(remote_workers);
        Self {
            inner: Mutex::new(PoolInner {
                workers,
                busy: HashSet::new(),
                local_count,
            }),
            local_factory,
        }
    }

    pub async fn size(&self) -> usize {
        self.inner.lock().await.workers.len()
    }

    /// Workers currently able to take a task.
    pub async fn get_available_count(&self) -> usize {
        let inner = self.inner.lock().await;
        let mut count = 0;
        for worker in &inner.workers {
            if !inner.busy.contains(worker.id()) && worker.is_available().await {
                count += 1;
            }
        }
        count
    }

    /// Claim an available worker, marking it busy. Returns `None` when
    /// every worker is claimed or mid-execution.
    pub async fn get_worker(&self) -> Option<Arc<dyn Worker>> {
        let mut inner = self.inner.lock().await;
        let mut claimed = None;
        for worker in &inner.workers {
            if !inner.busy.contains(worker.id()) && worker.is_available().await {
                claimed = Some(Arc::clone(worker));
                break;
            }
        }
        if let Some(ref worker) = claimed {
            inner.busy.insert(worker.id().to_string());
            debug!(worker_id = %worker.id(), "Worker claimed");
        }
        claimed
    }

    /// Reset a worker and return it to the available set.
    ///
    /// Called from the always-runs epilogue of each execution, so a
    /// crashing worker never starves the pool.
    pub async fn release_worker(&self, worker: &Arc<dyn Worker>) {
        worker.reset().await;
        let mut inner = self.inner.lock().await;
        if !inner.busy.remove(worker.id()) {
            warn!(worker_id = %worker.id(), "Released a worker that was not marked busy");
        }
        debug!(worker_id = %worker.id(), "Worker released");
    }

    /// Adjust the number of local workers. Remote workers are untouched.
    /// Busy local workers are never removed; shrinking stops early if it
    /// would have to.
    pub async fn resize(&self, local_count: usize) {
        let mut inner = self.inner.lock().await;
        if local_count > inner.local_count {
            for i in inner.local_count..local_count {
                let worker = (self.local_factory)(i);
                let idx = inner.local_count;
                inner.workers.insert(idx, worker);
                inner.local_count += 1;
            }
        } else {
            while inner.local_count > local_count {
                let idx = inner.local_count - 1;
                let id = inner.workers[idx].id().to_string();
                if inner.busy.contains(&id) {
                    warn!(worker_id = %id, "Cannot shrink past a busy worker");
                    break;
                }
                inner.workers.remove(idx);
                inner.local_count -= 1;
            }
        }
        debug!(local_count = inner.local_count, total = inner.workers.len(), "Pool resized");
    }

    /// Force-terminate every worker. Used on abort.
    pub async fn kill_all(&self) {
        let workers: Vec<Arc<dyn Worker>> = {
            let inner = self.inner.lock().await;
            inner.workers.iter().map(Arc::clone).collect()
        };
        for worker in workers {
            worker.kill().await;
        }
    }

    /// Status snapshot of every worker in the pool.
    pub async fn get_all_statuses(&self) -> Vec<WorkerStatus> {
        let workers: Vec<Arc<dyn Worker>> = {
            let inner = self.inner.lock().await;
            inner.workers.iter().map(Arc::clone).collect()
        };
        let mut statuses = Vec::with_capacity(workers.len());
        for worker in workers {
            statuses.push(worker.status().await);
        }
        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::WorkerError;
    use crate::domain::models::{SwarmTask, WorkerResult, WorkerState};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::RwLock;

    struct StubWorker {
        id: String,
        state: RwLock<WorkerState>,
    }

    impl StubWorker {
        fn new(id: impl Into<String>) -> Arc<dyn Worker> {
            Arc::new(Self {
                id: id.into(),
                state: RwLock::new(WorkerState::Idle),
            })
        }
    }

    #[async_trait]
    impl Worker for StubWorker {
        fn id(&self) -> &str {
            &self.id
        }

        async fn execute(&self, _task: &SwarmTask) -> Result<WorkerResult, WorkerError> {
            *self.state.write().await = WorkerState::Completed;
            Ok(WorkerResult::success("ok", Duration::from_millis(1)))
        }

        async fn status(&self) -> WorkerStatus {
            WorkerStatus::idle(&self.id)
        }

        async fn is_available(&self) -> bool {
            self.state.read().await.is_available()
        }

        async fn reset(&self) {
            *self.state.write().await = WorkerState::Idle;
        }

        async fn kill(&self) {
            *self.state.write().await = WorkerState::Failed;
        }
    }

    fn pool(local: usize) -> WorkerPool {
        WorkerPool::new(
            local,
            Box::new(|i| StubWorker::new(format!("local-{i}"))),
            vec![],
        )
    }

    #[tokio::test]
    async fn test_available_plus_busy_is_pool_size() {
        let pool = pool(3);
        assert_eq!(pool.get_available_count().await, 3);

        let w1 = pool.get_worker().await.unwrap();
        let w2 = pool.get_worker().await.unwrap();
        assert_eq!(pool.get_available_count().await, 1);
        assert_eq!(pool.size().await, 3);

        pool.release_worker(&w1).await;
        assert_eq!(pool.get_available_count().await, 2);
        pool.release_worker(&w2).await;
        assert_eq!(pool.get_available_count().await, 3);
    }

    #[tokio::test]
    async fn test_exhausted_pool_returns_none() {
        let pool = pool(1);
        let w = pool.get_worker().await.unwrap();
        assert!(pool.get_worker().await.is_none());
        pool.release_worker(&w).await;
        assert!(pool.get_worker().await.is_some());
    }

    #[tokio::test]
    async fn test_resize_grows_and_shrinks() {
        let pool = pool(2);
        pool.resize(4).await;
        assert_eq!(pool.size().await, 4);
        pool.resize(1).await;
        assert_eq!(pool.size().await, 1);
    }

    #[tokio::test]
    async fn test_resize_does_not_remove_busy_worker() {
        let pool = pool(1);
        let _w = pool.get_worker().await.unwrap();
        pool.resize(0).await;
        assert_eq!(pool.size().await, 1);
    }

    #[tokio::test]
    async fn test_remote_workers_survive_resize() {
        let pool = WorkerPool::new(
            1,
            Box::new(|i| StubWorker::new(format!("local-{i}"))),
            vec![StubWorker::new("remote-0")],
        );
        pool.resize(0).await;
        assert_eq!(pool.size().await, 1);
        let statuses = pool.get_all_statuses().await;
        assert_eq!(statuses[0].id, "remote-0");
    }
}
