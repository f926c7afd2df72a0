//! Hivemind - Autonomous Multi-Agent Task Orchestrator
//!
//! Hivemind accepts work items with priorities and dependencies,
//! dispatches them to a pool of execution workers (local subprocess
//! agents or remote network agents), retries failures per policy, and
//! aggregates results. A separate periodic control loop grows and
//! shrinks the remote fleet from backlog and idle-time telemetry.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure models, ports, and the error taxonomy
//! - **Application Layer** (`application`): TaskQueue, WorkerPool,
//!   SwarmCoordinator, and the scaling engines
//! - **Adapters Layer** (`adapters`): subprocess and RPC workers, the
//!   JSON-RPC transport, fleet control, result extraction
//! - **Infrastructure Layer** (`infrastructure`): configuration and
//!   external file formats
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use application::{
    ElasticScalingEngine, QueueStats, RuleScalingEngine, SwarmCoordinator, TaskQueue, WorkerPool,
};
pub use domain::error::{DomainError, TaskError, WorkerError};
pub use domain::models::{
    Config, FailedTask, FleetMetrics, RetryPolicy, ScalingRule, SwarmEvent, SwarmResult, SwarmTask,
    TaskResult, TaskScope, TaskState, WorkerResult, WorkerState, WorkerStatus,
};
pub use domain::ports::{FleetControl, MetricSource, ResultExtractor, Worker};
pub use infrastructure::config::{ConfigError, ConfigLoader};
