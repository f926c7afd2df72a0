//! Local worker that shells out to a coding-agent CLI.
//!
//! The agent binary must be installed and authenticated separately.
//! Each task becomes one invocation: the description goes in as the
//! prompt, the task scope becomes `--file`/`--dir`/`--pattern`
//! arguments, and stdout is captured line-wise under a deadline.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::error::WorkerError;
use crate::domain::models::{AgentConfig, SwarmTask, WorkerResult, WorkerState, WorkerStatus};
use crate::domain::ports::{ResultExtractor, Worker};

pub struct ProcessWorker {
    id: String,
    config: AgentConfig,
    timeout_secs: Option<u64>,
    extractor: Arc<dyn ResultExtractor>,
    status: RwLock<WorkerStatus>,
    child_pid: Mutex<Option<u32>>,
}

impl ProcessWorker {
    pub fn new(
        id: impl Into<String>,
        config: AgentConfig,
        timeout_secs: Option<u64>,
        extractor: Arc<dyn ResultExtractor>,
    ) -> Self {
        let id = id.into();
        Self {
            status: RwLock::new(WorkerStatus::idle(&id)),
            id,
            config,
            timeout_secs,
            extractor,
            child_pid: Mutex::new(None),
        }
    }

    fn build_command(&self, task: &SwarmTask) -> Command {
        let mut cmd = Command::new(&self.config.binary_path);
        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.arg("-p").arg(&task.description);
        for file in &task.scope.files {
            cmd.arg("--file").arg(file);
        }
        for dir in &task.scope.directories {
            cmd.arg("--dir").arg(dir);
        }
        if let Some(ref pattern) = task.scope.pattern {
            cmd.arg("--pattern").arg(pattern);
        }
        cmd.args(&self.config.extra_flags);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn transition(&self, state: WorkerState) {
        let mut status = self.status.write().await;
        status.state = state;
        if state.is_available() {
            status.completed_at = Some(Utc::now());
        }
    }
}

#[async_trait]
impl Worker for ProcessWorker {
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
            status.completed_at = None;
        }

        let start = Instant::now();
        let mut child = match self.build_command(task).spawn() {
            Ok(child) => child,
            Err(e) => {
                self.transition(WorkerState::Failed).await;
                return Err(WorkerError::Execution(format!(
                    "Failed to spawn {}: {e}",
                    self.config.binary_path
                )));
            }
        };
        *self.child_pid.lock().await = child.id();
        debug!(worker_id = %self.id, task_id = %task.id, pid = ?child.id(), "Agent process spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let capture = async {
            let drain_stdout = async {
                let mut output = String::new();
                if let Some(stdout) = stdout {
                    let mut lines = BufReader::new(stdout).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        output.push_str(&line);
                        output.push('\n');
                    }
                }
                output
            };
            let drain_stderr = async {
                let mut errors = String::new();
                if let Some(stderr) = stderr {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        errors.push_str(&line);
                        errors.push('\n');
                    }
                }
                errors
            };
            // Both pipes drain together; a full stderr buffer must not
            // stall stdout capture.
            let (output, errors) = tokio::join!(drain_stdout, drain_stderr);
            let status = child
                .wait()
                .await
                .map_err(|e| WorkerError::Execution(format!("Failed to wait for agent: {e}")))?;
            Ok::<_, WorkerError>((output, errors, status))
        };

        let deadline = self.timeout_secs.map(Duration::from_secs);
        let captured = match deadline {
            Some(limit) => match timeout(limit, capture).await {
                Ok(captured) => captured,
                Err(_) => {
                    self.kill().await;
                    *self.child_pid.lock().await = None;
                    return Err(WorkerError::Timeout(limit.as_secs()));
                }
            },
            None => capture.await,
        };
        *self.child_pid.lock().await = None;

        let (output, errors, exit) = match captured {
            Ok(triple) => triple,
            Err(e) => {
                self.transition(WorkerState::Failed).await;
                return Err(e);
            }
        };
        let duration = start.elapsed();

        if exit.success() {
            let changes = self.extractor.extract(&output);
            self.transition(WorkerState::Completed).await;
            let mut result = WorkerResult::success(output, duration);
            result.files_changed = changes.files_changed;
            result.commit_hash = changes.commit_hash;
            Ok(result)
        } else {
            self.transition(WorkerState::Failed).await;
            let mut result = WorkerResult::failure(
                format!(
                    "Agent exited with code {:?}: {}",
                    exit.code(),
                    errors.trim()
                ),
                duration,
            );
            result.output = output;
            Ok(result)
        }
    }

    async fn status(&self) -> WorkerStatus {
        self.status.read().await.clone()
    }

    async fn is_available(&self) -> bool {
        self.status.read().await.state.is_available()
    }

    async fn reset(&self) {
        let mut status = self.status.write().await;
        *status = WorkerStatus::idle(&self.id);
    }

    async fn kill(&self) {
        let pid = self.child_pid.lock().await.take();
        if let Some(pid) = pid {
            #[allow(clippy::cast_possible_wrap)]
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                warn!(worker_id = %self.id, pid, error = %e, "SIGKILL failed");
            } else {
                debug!(worker_id = %self.id, pid, "Agent process killed");
            }
        }
        self.transition(WorkerState::Failed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::extractor::RegexResultExtractor;

    fn worker_with_binary(binary: &str, flags: Vec<String>) -> ProcessWorker {
        let config = AgentConfig {
            binary_path: binary.to_string(),
            extra_flags: flags,
            working_dir: None,
        };
        ProcessWorker::new("local-0", config, Some(5), Arc::new(RegexResultExtractor::new()))
    }

    fn task(description: &str) -> SwarmTask {
        SwarmTask::new("t1", description, 1)
    }

    #[tokio::test]
    async fn test_missing_binary_is_execution_error() {
        let worker = worker_with_binary("/nonexistent/agent-binary", vec![]);
        let err = worker.execute(&task("hello")).await.unwrap_err();
        assert!(matches!(err, WorkerError::Execution(_)));
        assert!(!matches!(worker.status().await.state, WorkerState::Running));
    }

    #[tokio::test]
    async fn test_successful_run_captures_output() {
        // `echo` ignores the orchestration flags and prints its args.
        let worker = worker_with_binary("echo", vec![]);
        let result = worker.execute(&task("modified src/a.rs")).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("modified src/a.rs"));
        assert_eq!(result.files_changed, vec!["src/a.rs"]);
        assert_eq!(worker.status().await.state, WorkerState::Completed);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure_result() {
        let worker = worker_with_binary("false", vec![]);
        let result = worker.execute(&task("anything")).await.unwrap();
        assert!(!result.success);
        assert!(result.error.is_some());
        assert_eq!(worker.status().await.state, WorkerState::Failed);
    }

    #[tokio::test]
    async fn test_large_stderr_does_not_stall_stdout_capture() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        // Writes well past the pipe buffer on stderr before stdout
        // closes; serialized capture would deadlock into the timeout.
        let mut script = tempfile::NamedTempFile::new().unwrap();
        writeln!(script, "#!/bin/sh").unwrap();
        writeln!(script, "i=0").unwrap();
        writeln!(
            script,
            "while [ $i -lt 4000 ]; do echo 'stderr filler line, sixty-odd bytes of pipe padding' >&2; i=$((i+1)); done"
        )
        .unwrap();
        writeln!(script, "echo 'modified src/big.rs'").unwrap();
        script.flush().unwrap();
        // Close the write handle before exec, or the spawn hits ETXTBSY.
        let path = script.into_temp_path();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let worker = worker_with_binary(path.to_str().unwrap(), vec![]);
        let result = worker.execute(&task("noisy")).await.unwrap();
        assert!(result.success);
        assert_eq!(result.files_changed, vec!["src/big.rs"]);
    }

    #[tokio::test]
    async fn test_reset_returns_worker_to_idle() {
        let worker = worker_with_binary("false", vec![]);
        let _ = worker.execute(&task("anything")).await;
        worker.reset().await;
        let status = worker.status().await;
        assert_eq!(status.state, WorkerState::Idle);
        assert!(status.current_task.is_none());
    }
}
