//! Fleet-control port.
//!
//! The RPC surface the scaling engines drive: telemetry plus
//! spawn/terminate. Implemented over the persistent JSON-RPC connection
//! in the adapters layer; tests substitute an in-memory mock.

use async_trait::async_trait;

use crate::domain::models::FleetMetrics;

/// Errors from fleet-control calls. Never fatal to a scaling tick.
#[derive(thiserror::Error, Debug)]
pub enum FleetError {
    #[error("Fleet connection failed: {0}")]
    Connection(String),

    #[error("Fleet RPC failed: {0}")]
    Rpc(String),
}

#[async_trait]
pub trait FleetControl: Send + Sync {
    /// Fetch fleet-wide telemetry.
    async fn get_agent_metrics(&self) -> Result<FleetMetrics, FleetError>;

    /// Spawn one agent of the given role/template.
    async fn spawn_subagent(
        &self,
        role: &str,
        task: &str,
        parent_agent_id: Option<&str>,
    ) -> Result<(), FleetError>;

    /// Terminate one agent by id.
    async fn terminate_agent(&self, agent_id: &str) -> Result<(), FleetError>;
}
