use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid local_workers: {0}. Must be between 1 and 100")]
    InvalidLocalWorkers(usize),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Agent binary_path cannot be empty")]
    EmptyAgentBinary,

    #[error("Invalid tick_interval_secs: {0}. Cannot be 0")]
    InvalidTickInterval(u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .hivemind/config.yaml (project config)
    /// 3. .hivemind/local.yaml (project local overrides, optional)
    /// 4. Environment variables (HIVEMIND_* prefix, highest priority)
    ///
    /// Configuration is always project-local (pwd/.hivemind/) so
    /// multiple swarms can run on one machine against different trees.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".hivemind/config.yaml"))
            .merge(Yaml::file(".hivemind/local.yaml"))
            .merge(Env::prefixed("HIVEMIND_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.pool.local_workers == 0 || config.pool.local_workers > 100 {
            return Err(ConfigError::InvalidLocalWorkers(config.pool.local_workers));
        }

        for endpoint in &config.pool.remote_endpoints {
            if endpoint.name.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "Remote endpoint name cannot be empty".to_string(),
                ));
            }
            if endpoint.address.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "Remote endpoint '{}' address cannot be empty",
                    endpoint.name
                )));
            }
        }

        if config.retry.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }

        if config.agent.binary_path.is_empty() {
            return Err(ConfigError::EmptyAgentBinary);
        }

        if config.scaling.tick_interval_secs == 0 {
            return Err(ConfigError::InvalidTickInterval(
                config.scaling.tick_interval_secs,
            ));
        }

        if config.scaling.control_endpoint.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "scaling.control_endpoint cannot be empty".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
