//! Domain models.

pub mod config;
pub mod events;
pub mod scaling;
pub mod task;
pub mod worker;

pub use config::{
    AgentConfig, Config, LoggingConfig, PoolConfig, RemoteEndpointConfig, RetryConfig,
    ScalingConfig,
};
pub use events::SwarmEvent;
pub use scaling::{
    AgentMetric, FleetCommand, FleetMetrics, ScalingAction, ScalingOutcome, ScalingRule,
};
pub use task::{FailedTask, SwarmResult, SwarmTask, TaskResult, TaskScope, TaskState};
pub use worker::{RetryPolicy, WorkerResult, WorkerState, WorkerStatus};
