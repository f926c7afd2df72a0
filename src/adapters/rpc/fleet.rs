//! Fleet control over the JSON-RPC transport.
//!
//! Holds at most one live connection and reconnects lazily on the next
//! call after a transport failure, so one dead controller never wedges
//! the scaling loop.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::adapters::rpc::client::{RpcClient, RpcError};
use crate::domain::models::FleetMetrics;
use crate::domain::ports::{FleetControl, FleetError};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RpcFleetControl {
    endpoint: String,
    call_timeout: Duration,
    client: Mutex<Option<RpcClient>>,
}

impl RpcFleetControl {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            client: Mutex::new(None),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, FleetError> {
        let mut guard = self.client.lock().await;
        let client = match guard.take() {
            Some(client) => guard.insert(client),
            None => {
                debug!(endpoint = %self.endpoint, "Connecting to fleet controller");
                let client = RpcClient::connect(&self.endpoint)
                    .await
                    .map_err(|e| FleetError::Connection(e.to_string()))?;
                guard.insert(client)
            }
        };
        match client.call(method, params, Some(self.call_timeout)).await {
            Ok(value) => Ok(value),
            Err(e @ (RpcError::Connection { .. } | RpcError::Timeout(_))) => {
                // Transport state is unknown; force a fresh connection
                // on the next call.
                warn!(endpoint = %self.endpoint, error = %e, "Dropping fleet connection");
                *guard = None;
                Err(FleetError::Connection(e.to_string()))
            }
            Err(e) => Err(FleetError::Rpc(e.to_string())),
        }
    }
}

#[async_trait]
impl FleetControl for RpcFleetControl {
    async fn get_agent_metrics(&self) -> Result<FleetMetrics, FleetError> {
        let value = self.call("get_agent_metrics", json!({})).await?;
        serde_json::from_value(value).map_err(|e| FleetError::Rpc(format!("Bad telemetry payload: {e}")))
    }

    async fn spawn_subagent(
        &self,
        role: &str,
        task: &str,
        parent_agent_id: Option<&str>,
    ) -> Result<(), FleetError> {
        let mut params = json!({ "role": role, "task": task });
        if let Some(parent) = parent_agent_id {
            params["parentAgentId"] = json!(parent);
        }
        self.call("spawn_subagent", params).await?;
        Ok(())
    }

    async fn terminate_agent(&self, agent_id: &str) -> Result<(), FleetError> {
        self.call("terminate_agent", json!({ "agentId": agent_id }))
            .await?;
        Ok(())
    }
}
