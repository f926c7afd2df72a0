//! Scaling engines driven by real snapshot/rules files and a mock
//! fleet controller.

use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use hivemind::application::{ElasticScalingEngine, RuleScalingEngine};
use hivemind::domain::models::{AgentMetric, ScalingConfig};
use hivemind::domain::ports::{FleetControl, FleetError};
use hivemind::infrastructure::{load_rules, BacklogReader, FileMetricSource};
use hivemind::FleetMetrics;

#[derive(Default)]
struct MockFleet {
    metrics: FleetMetrics,
    fail_all: bool,
    spawns: Mutex<Vec<(String, String)>>,
    terminations: Mutex<Vec<String>>,
}

#[async_trait]
impl FleetControl for MockFleet {
    async fn get_agent_metrics(&self) -> Result<FleetMetrics, FleetError> {
        if self.fail_all {
            return Err(FleetError::Connection("controller down".to_string()));
        }
        Ok(self.metrics.clone())
    }

    async fn spawn_subagent(
        &self,
        role: &str,
        task: &str,
        _parent_agent_id: Option<&str>,
    ) -> Result<(), FleetError> {
        if self.fail_all {
            return Err(FleetError::Connection("controller down".to_string()));
        }
        self.spawns
            .lock()
            .unwrap()
            .push((role.to_string(), task.to_string()));
        Ok(())
    }

    async fn terminate_agent(&self, agent_id: &str) -> Result<(), FleetError> {
        if self.fail_all {
            return Err(FleetError::Connection("controller down".to_string()));
        }
        self.terminations.lock().unwrap().push(agent_id.to_string());
        Ok(())
    }
}

fn backlog_file(pending: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let tasks: Vec<String> = (0..pending).map(|i| format!(r#"{{"id": "p{i}"}}"#)).collect();
    write!(file, r#"{{"pendingTasks": [{}]}}"#, tasks.join(",")).unwrap();
    file.flush().unwrap();
    file
}

fn agent(id: &str, idle: u64) -> AgentMetric {
    AgentMetric {
        id: id.to_string(),
        idle_seconds: idle,
        template: None,
    }
}

fn engine(fleet: Arc<MockFleet>, backlog: &NamedTempFile) -> ElasticScalingEngine {
    ElasticScalingEngine::new(
        fleet,
        Arc::new(BacklogReader::new(backlog.path())),
        ScalingConfig::default(),
    )
}

#[tokio::test]
async fn test_backlog_over_threshold_spawns_exactly_one_worker_per_tick() {
    let backlog = backlog_file(12);
    let fleet = Arc::new(MockFleet::default());
    let engine = engine(Arc::clone(&fleet), &backlog);

    for _ in 0..3 {
        let outcome = engine.tick().await;
        assert_eq!(outcome.spawned, 1);
    }
    let spawns = fleet.spawns.lock().unwrap();
    assert_eq!(spawns.len(), 3);
    assert!(spawns.iter().all(|(role, _)| role == "Worker"));
}

#[tokio::test]
async fn test_small_backlog_spawns_nothing() {
    let backlog = backlog_file(3);
    let fleet = Arc::new(MockFleet::default());
    let outcome = engine(Arc::clone(&fleet), &backlog).tick().await;
    assert_eq!(outcome.spawned, 0);
    assert!(fleet.spawns.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_idle_threshold_is_strict() {
    let backlog = backlog_file(0);
    let fleet = Arc::new(MockFleet {
        metrics: FleetMetrics {
            total_agents: 3,
            agents: vec![agent("at-threshold", 300), agent("over", 301), agent("busy", 2)],
        },
        ..MockFleet::default()
    });
    let outcome = engine(Arc::clone(&fleet), &backlog).tick().await;
    // 300 is not over the 300s threshold
    assert_eq!(outcome.terminated, vec!["over"]);
}

#[tokio::test]
async fn test_multiple_idle_agents_all_terminated_in_one_tick() {
    let backlog = backlog_file(0);
    let fleet = Arc::new(MockFleet {
        metrics: FleetMetrics {
            total_agents: 3,
            agents: vec![agent("i1", 400), agent("i2", 500), agent("i3", 600)],
        },
        ..MockFleet::default()
    });
    let outcome = engine(Arc::clone(&fleet), &backlog).tick().await;
    assert_eq!(outcome.terminated.len(), 3);
}

#[tokio::test]
async fn test_missing_snapshot_reads_as_empty_backlog() {
    let fleet = Arc::new(MockFleet::default());
    let engine = ElasticScalingEngine::new(
        Arc::clone(&fleet) as Arc<dyn FleetControl>,
        Arc::new(BacklogReader::new("/nonexistent/backlog.json")),
        ScalingConfig::default(),
    );
    let outcome = engine.tick().await;
    assert_eq!(outcome.spawned, 0);
    assert_eq!(outcome.errors, 0);
}

#[tokio::test]
async fn test_dead_controller_never_fails_the_tick() {
    let backlog = backlog_file(50);
    let fleet = Arc::new(MockFleet {
        fail_all: true,
        ..MockFleet::default()
    });
    // tick() is infallible by contract; the failures show up as counts.
    let outcome = engine(Arc::clone(&fleet), &backlog).tick().await;
    assert_eq!(outcome.spawned, 0);
    assert!(outcome.terminated.is_empty());
    assert!(outcome.errors >= 2);
}

#[tokio::test]
async fn test_rule_engine_from_files() {
    let mut rules_file = NamedTempFile::new().unwrap();
    write!(
        rules_file,
        r#"[{{
            "metric": "issue-backlog-by-label",
            "threshold": 10,
            "cooldown_threshold": 2,
            "action": "spawn",
            "cooldown_action": "terminate",
            "agent_template": "triage",
            "count": 2
        }}]"#
    )
    .unwrap();
    rules_file.flush().unwrap();

    let mut metrics_file = NamedTempFile::new().unwrap();
    write!(metrics_file, r#"{{"issue-backlog-by-label": 25}}"#).unwrap();
    metrics_file.flush().unwrap();

    let rules = load_rules(rules_file.path()).await.unwrap();
    let fleet = Arc::new(MockFleet::default());
    let engine = RuleScalingEngine::new(
        Arc::clone(&fleet) as Arc<dyn FleetControl>,
        Arc::new(FileMetricSource::new(metrics_file.path())),
        rules,
        5,
    );

    let outcome = engine.tick().await;
    assert_eq!(outcome.spawned, 2);
    let spawns = fleet.spawns.lock().unwrap();
    assert!(spawns.iter().all(|(role, _)| role == "triage"));
}

#[tokio::test]
async fn test_shutdown_stops_the_loop() {
    let backlog = backlog_file(0);
    let fleet = Arc::new(MockFleet::default());
    let engine = Arc::new(engine(fleet, &backlog));
    let handle = engine.start();
    engine.shutdown();
    // A hung loop would make this await never return.
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("loop should stop promptly")
        .unwrap();
}
