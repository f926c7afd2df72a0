//! Worker port.
//!
//! One call surface over both worker variants (local subprocess and
//! remote RPC), so the pool holds a homogeneous collection of trait
//! objects.

use async_trait::async_trait;

use crate::domain::error::WorkerError;
use crate::domain::models::{SwarmTask, WorkerResult, WorkerStatus};

/// An executor of exactly one task at a time.
///
/// State machine: `idle -> running` on `execute`, `running ->
/// completed|failed` on settlement, back to `idle` via `reset`. A second
/// `execute` while `running` must fail with [`WorkerError::Busy`] rather
/// than queue or interleave.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Stable identifier, unique within the pool.
    fn id(&self) -> &str;

    /// Execute one task to settlement.
    ///
    /// An `Err` or an `Ok` with `success == false` both count as an
    /// execution failure for retry accounting.
    async fn execute(&self, task: &SwarmTask) -> Result<WorkerResult, WorkerError>;

    /// Point-in-time status snapshot.
    async fn status(&self) -> WorkerStatus;

    /// Whether the worker can accept a task right now.
    async fn is_available(&self) -> bool;

    /// Return a settled worker to `idle`.
    async fn reset(&self);

    /// Force-terminate any in-flight execution. Safe to call in any
    /// state; leaves the worker `failed` if it was `running`.
    async fn kill(&self);
}
