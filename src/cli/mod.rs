//! CLI surface: argument parsing and error rendering.

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "hivemind",
    version,
    about = "Autonomous multi-agent task orchestrator",
    propagate_version = true
)]
pub struct Cli {
    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a batch of tasks through the worker pool
    Run(commands::run::RunArgs),
    /// Run the elastic scaling control loop
    Scale(commands::scale::ScaleArgs),
    /// Shape-check a task descriptor file
    Validate(commands::validate::ValidateArgs),
}

/// Render a top-level error and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) {
    if json_mode {
        let payload = serde_json::json!({ "error": format!("{err:#}") });
        eprintln!("{payload}");
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
