//! `hivemind run`: drive a task batch to completion.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;

use crate::adapters::{ProcessWorker, RegexResultExtractor, RemoteWorker};
use crate::application::worker_pool::LocalWorkerFactory;
use crate::application::{SwarmCoordinator, WorkerPool};
use crate::domain::error::WorkerError;
use crate::domain::models::{
    RetryPolicy, SwarmEvent, SwarmResult, SwarmTask, WorkerResult, WorkerState, WorkerStatus,
};
use crate::domain::ports::{ResultExtractor, Worker};
use crate::infrastructure::ConfigLoader;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task descriptor file (JSON array of tasks)
    #[arg(long)]
    pub tasks: PathBuf,

    /// Local worker count (overrides pool.local_workers)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Total attempts allowed per task (overrides retry.max_retries)
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Per-task execution deadline in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Use no-op workers instead of spawning agents
    #[arg(long)]
    pub dry_run: bool,

    /// Config file to use instead of the project-local lookup
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Worker that acknowledges every task without doing work.
struct DryRunWorker {
    id: String,
    status: RwLock<WorkerStatus>,
}

impl DryRunWorker {
    fn new(id: String) -> Self {
        Self {
            status: RwLock::new(WorkerStatus::idle(&id)),
            id,
        }
    }
}

#[async_trait]
impl Worker for DryRunWorker {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, task: &SwarmTask) -> Result<WorkerResult, WorkerError> {
        {
            let mut status = self.status.write().await;
            if status.state == WorkerState::Running {
                return Err(WorkerError::Busy(self.id.clone()));
            }
            status.state = WorkerState::Running;
            status.current_task = Some(task.id.clone());
            status.started_at = Some(Utc::now());
        }
        let mut status = self.status.write().await;
        status.state = WorkerState::Completed;
        status.completed_at = Some(Utc::now());
        Ok(WorkerResult::success(
            format!("dry-run: {}", task.description),
            Duration::ZERO,
        ))
    }

    async fn status(&self) -> WorkerStatus {
        self.status.read().await.clone()
    }

    async fn is_available(&self) -> bool {
        self.status.read().await.state.is_available()
    }

    async fn reset(&self) {
        *self.status.write().await = WorkerStatus::idle(&self.id);
    }

    async fn kill(&self) {
        self.status.write().await.state = WorkerState::Failed;
    }
}

pub async fn execute(args: RunArgs, json_mode: bool) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(max_retries) = args.max_retries {
        config.retry.max_retries = max_retries;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.retry.task_timeout_secs = Some(timeout_secs);
    }

    let raw = tokio::fs::read_to_string(&args.tasks)
        .await
        .with_context(|| format!("Failed to read task file {}", args.tasks.display()))?;
    let tasks: Vec<SwarmTask> = serde_json::from_str(&raw)
        .with_context(|| format!("Malformed task file {}", args.tasks.display()))?;

    let extractor: Arc<dyn ResultExtractor> = Arc::new(RegexResultExtractor::new());
    let timeout_secs = config.retry.task_timeout_secs;

    let factory: LocalWorkerFactory = if args.dry_run {
        Box::new(|i| Arc::new(DryRunWorker::new(format!("local-{i}"))))
    } else {
        let agent = config.agent.clone();
        let extractor = Arc::clone(&extractor);
        Box::new(move |i| {
            Arc::new(ProcessWorker::new(
                format!("local-{i}"),
                agent.clone(),
                timeout_secs,
                Arc::clone(&extractor),
            ))
        })
    };

    // Dry runs stay entirely local.
    let remotes: Vec<Arc<dyn Worker>> = if args.dry_run {
        vec![]
    } else {
        config
            .pool
            .remote_endpoints
            .iter()
            .map(|endpoint| {
                Arc::new(RemoteWorker::new(
                    format!("remote-{}", endpoint.name),
                    &endpoint.address,
                    timeout_secs,
                    Arc::clone(&extractor),
                )) as Arc<dyn Worker>
            })
            .collect()
    };

    let local_count = args.concurrency.unwrap_or(config.pool.local_workers);
    let pool = Arc::new(WorkerPool::new(local_count, factory, remotes));
    let coordinator = Arc::new(SwarmCoordinator::new(
        pool,
        RetryPolicy {
            max_retries: config.retry.max_retries,
        },
    ));
    coordinator.add_tasks(tasks).await?;

    if !json_mode {
        println!("Starting Hivemind swarm");
        println!("   Workers: {} local", local_count);
        if args.dry_run {
            println!("   Mode: DRY RUN (no-op workers)");
        }
        println!();
    }

    let mut event_rx = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    if !json_mode {
                        print_event(&event);
                    }
                    if matches!(event, SwarmEvent::SwarmComplete { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let run = coordinator.run(None);
    tokio::pin!(run);
    let result = tokio::select! {
        result = &mut run => result?,
        _ = tokio::signal::ctrl_c() => {
            coordinator.abort().await;
            run.await?
        }
    };
    let _ = printer.await;

    print_result(&result, json_mode)?;
    Ok(())
}

fn print_event(event: &SwarmEvent) {
    match event {
        SwarmEvent::TaskStart { task_id, worker_id } => {
            println!("  Task started: {task_id} [worker: {worker_id}]");
        }
        SwarmEvent::TaskRetry { task_id, attempt } => {
            println!("  Task retrying: {task_id} (attempt {attempt})");
        }
        SwarmEvent::TaskComplete { task_id, worker_id } => {
            println!("  Task completed: {task_id} [worker: {worker_id}]");
        }
        SwarmEvent::TaskFail { task_id, error } => {
            println!("  Task failed: {task_id} - {error}");
        }
        SwarmEvent::SwarmComplete { .. } => {}
    }
}

fn print_result(result: &SwarmResult, json_mode: bool) -> Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    println!();
    println!("Swarm run complete");
    println!("==================");
    println!("Total:        {}", result.total);
    println!("Completed:    {}", result.completed);
    println!("Failed:       {}", result.failed);
    println!("Skipped:      {}", result.skipped);
    println!("Success rate: {:.0}%", result.success_rate * 100.0);
    println!("Duration:     {:.1}s", result.duration.as_secs_f64());
    if !result.failed_tasks.is_empty() {
        println!("\nFailures:");
        for failure in &result.failed_tasks {
            println!(
                "  {} - {} ({} attempts)",
                failure.task.id, failure.error, failure.attempts
            );
        }
    }
    Ok(())
}
