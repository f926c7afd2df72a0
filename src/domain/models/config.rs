use serde::{Deserialize, Serialize};

/// Main configuration structure for Hivemind.
///
/// All tunables are explicit here; nothing in the hot path reads the
/// environment directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Worker pool configuration
    #[serde(default)]
    pub pool: PoolConfig,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Subprocess agent configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Elastic scaling configuration
    #[serde(default)]
    pub scaling: ScalingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PoolConfig {
    /// Number of local subprocess workers (1-100)
    #[serde(default = "default_local_workers")]
    pub local_workers: usize,

    /// Remote worker endpoints; one worker is created per entry
    #[serde(default)]
    pub remote_endpoints: Vec<RemoteEndpointConfig>,
}

const fn default_local_workers() -> usize {
    4
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            local_workers: default_local_workers(),
            remote_endpoints: vec![],
        }
    }
}

/// A single remote worker endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RemoteEndpointConfig {
    /// Display name, also used in worker ids
    pub name: String,

    /// host:port of the agent's JSON-RPC listener
    pub address: String,
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Total attempts allowed per task, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-task execution timeout in seconds; None disables the deadline
    #[serde(default = "default_task_timeout", skip_serializing_if = "Option::is_none")]
    pub task_timeout_secs: Option<u64>,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_task_timeout() -> Option<u64> {
    Some(3600)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            task_timeout_secs: default_task_timeout(),
        }
    }
}

/// Subprocess agent configuration for local workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Path to the coding-agent binary
    #[serde(default = "default_agent_binary")]
    pub binary_path: String,

    /// Extra CLI flags appended to every invocation
    #[serde(default)]
    pub extra_flags: Vec<String>,

    /// Working directory for agent processes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

fn default_agent_binary() -> String {
    "claude".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary_path: default_agent_binary(),
            extra_flags: vec![],
            working_dir: None,
        }
    }
}

/// Elastic scaling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScalingConfig {
    /// Control-loop tick interval in seconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// host:port of the fleet-control JSON-RPC endpoint
    #[serde(default = "default_control_endpoint")]
    pub control_endpoint: String,

    /// Path of the backlog snapshot written by the external scheduler
    #[serde(default = "default_backlog_path")]
    pub backlog_path: String,

    /// Backlog size above which one worker is spawned per tick
    #[serde(default = "default_backlog_threshold")]
    pub backlog_threshold: u64,

    /// Idle seconds above which an agent is terminated
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_secs: u64,

    /// Safety cap on concurrent agents per template (rule engine)
    #[serde(default = "default_max_per_template")]
    pub max_agents_per_template: u64,

    /// Optional path of the generalized scaling rules file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<String>,
}

const fn default_tick_interval() -> u64 {
    30
}

fn default_control_endpoint() -> String {
    "127.0.0.1:9400".to_string()
}

fn default_backlog_path() -> String {
    ".hivemind/backlog.json".to_string()
}

const fn default_backlog_threshold() -> u64 {
    5
}

const fn default_idle_threshold() -> u64 {
    300
}

const fn default_max_per_template() -> u64 {
    5
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            control_endpoint: default_control_endpoint(),
            backlog_path: default_backlog_path(),
            backlog_threshold: default_backlog_threshold(),
            idle_threshold_secs: default_idle_threshold(),
            max_agents_per_template: default_max_per_template(),
            rules_path: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
