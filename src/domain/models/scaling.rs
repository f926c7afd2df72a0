//! Fleet telemetry and scaling-rule models.

use serde::{Deserialize, Serialize};

/// Telemetry for one remote agent, as reported by the fleet controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetric {
    pub id: String,
    #[serde(rename = "idleSeconds")]
    pub idle_seconds: u64,
    /// Agent template this instance was spawned from, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// Fleet-wide telemetry snapshot from `get_agent_metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetMetrics {
    #[serde(rename = "total_agents")]
    pub total_agents: u64,
    #[serde(default)]
    pub agents: Vec<AgentMetric>,
}

/// What a scaling rule does when its threshold trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    Spawn,
    Terminate,
    None,
}

/// One entry in the generalized scaling rules file.
///
/// `threshold`/`action` fire when the metric is at or above the
/// threshold; `cooldown_threshold`/`cooldown_action` when it is at or
/// below the cooldown threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingRule {
    /// Named metric to evaluate (e.g. "issue-backlog-by-label")
    pub metric: String,
    pub threshold: u64,
    pub cooldown_threshold: u64,
    pub action: ScalingAction,
    pub cooldown_action: ScalingAction,
    /// Agent template to spawn or terminate
    pub agent_template: String,
    /// Agents spawned when the rule fires
    #[serde(default = "default_spawn_count")]
    pub count: u32,
}

const fn default_spawn_count() -> u32 {
    1
}

/// A concrete spawn/terminate decision produced by rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetCommand {
    Spawn { role: String, task: String },
    Terminate { agent_id: String },
}

/// What a single scaling tick actually did, for logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalingOutcome {
    pub spawned: u32,
    pub terminated: Vec<String>,
    /// RPC failures encountered during the tick (already logged)
    pub errors: u32,
}
