//! Infrastructure: configuration loading and external file formats.

pub mod backlog;
pub mod config;
pub mod rules;

pub use backlog::BacklogReader;
pub use config::{ConfigError, ConfigLoader};
pub use rules::{load_rules, FileMetricSource};
