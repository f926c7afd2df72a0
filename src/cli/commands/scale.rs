//! `hivemind scale`: run the fleet scaling control loops.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::adapters::RpcFleetControl;
use crate::application::{ElasticScalingEngine, RuleScalingEngine};
use crate::domain::models::ScalingOutcome;
use crate::infrastructure::{load_rules, BacklogReader, ConfigLoader, FileMetricSource};

#[derive(Args, Debug)]
pub struct ScaleArgs {
    /// Run a single tick and exit instead of looping
    #[arg(long)]
    pub once: bool,

    /// Scaling rules file (overrides scaling.rules_path)
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Metrics file consumed by the rules (flat JSON object)
    #[arg(long, default_value = ".hivemind/metrics.json")]
    pub metrics: PathBuf,

    /// Config file to use instead of the project-local lookup
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub async fn execute(args: ScaleArgs, json_mode: bool) -> Result<()> {
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let scaling = config.scaling.clone();

    let fleet = Arc::new(RpcFleetControl::new(scaling.control_endpoint.clone()));
    let backlog = Arc::new(BacklogReader::new(scaling.backlog_path.clone()));
    let engine = Arc::new(ElasticScalingEngine::new(
        fleet.clone(),
        backlog,
        scaling.clone(),
    ));

    let rules_path = args
        .rules
        .clone()
        .or_else(|| scaling.rules_path.as_ref().map(PathBuf::from));
    let rule_engine = match rules_path {
        Some(path) => {
            let rules = load_rules(&path)
                .await
                .with_context(|| format!("Failed to load scaling rules {}", path.display()))?;
            info!(rules = rules.len(), path = %path.display(), "Rule engine enabled");
            Some(Arc::new(RuleScalingEngine::new(
                fleet,
                Arc::new(FileMetricSource::new(args.metrics.clone())),
                rules,
                scaling.max_agents_per_template,
            )))
        }
        None => None,
    };

    if args.once {
        let mut outcome = engine.tick().await;
        if let Some(rule_engine) = &rule_engine {
            merge(&mut outcome, rule_engine.tick().await);
        }
        print_outcome(&outcome, json_mode)?;
        return Ok(());
    }

    let handle = engine.start();
    let rule_task = rule_engine.map(|rule_engine| {
        let period = Duration::from_secs(scaling.tick_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                rule_engine.tick().await;
            }
        })
    });

    if !json_mode {
        println!(
            "Scaling loop running every {}s against {} (Ctrl-C to stop)",
            scaling.tick_interval_secs, scaling.control_endpoint
        );
    }
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    engine.shutdown();
    handle.await.context("Scaling loop panicked")?;
    if let Some(rule_task) = rule_task {
        rule_task.abort();
    }
    Ok(())
}

fn merge(into: &mut ScalingOutcome, other: ScalingOutcome) {
    into.spawned += other.spawned;
    into.terminated.extend(other.terminated);
    into.errors += other.errors;
}

fn print_outcome(outcome: &ScalingOutcome, json_mode: bool) -> Result<()> {
    if json_mode {
        let payload = serde_json::json!({
            "spawned": outcome.spawned,
            "terminated": outcome.terminated,
            "errors": outcome.errors,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("Tick completed:");
        println!("  Spawned:    {}", outcome.spawned);
        println!("  Terminated: {}", outcome.terminated.len());
        for agent_id in &outcome.terminated {
            println!("    {agent_id}");
        }
        println!("  Errors:     {}", outcome.errors);
    }
    Ok(())
}
