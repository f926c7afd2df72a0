//! Application layer: orchestration logic built on the domain ports.

pub mod coordinator;
pub mod scaling;
pub mod task_queue;
pub mod worker_pool;

pub use coordinator::SwarmCoordinator;
pub use scaling::{ElasticScalingEngine, RuleScalingEngine};
pub use task_queue::{QueueStats, TaskQueue};
pub use worker_pool::{LocalWorkerFactory, WorkerPool};
