//! Elastic scaling: periodic control loops that grow and shrink the
//! remote agent fleet.
//!
//! Two engines share one command evaluator and the same fleet-control
//! RPC contract. [`ElasticScalingEngine`] is the fixed backlog/idle
//! policy; [`RuleScalingEngine`] generalizes it to a rules file. Both
//! run independently of the coordinator and a tick never returns an
//! error: every RPC failure is logged, counted, and survived.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::models::{
    FleetCommand, FleetMetrics, ScalingAction, ScalingConfig, ScalingOutcome, ScalingRule,
};
use crate::domain::ports::{FleetControl, MetricSource};

/// Metric name the elastic engine asks its source for.
pub const BACKLOG_METRIC: &str = "backlog";

const WORKER_TEMPLATE: &str = "Worker";
const BACKLOG_TASK: &str = "Drain pending task backlog";

/// Issue the given commands against the fleet, tolerating per-command
/// failures.
async fn apply_commands(fleet: &dyn FleetControl, commands: Vec<FleetCommand>) -> ScalingOutcome {
    let mut outcome = ScalingOutcome::default();
    for command in commands {
        match command {
            FleetCommand::Spawn { role, task } => {
                match fleet.spawn_subagent(&role, &task, None).await {
                    Ok(()) => {
                        info!(%role, "Spawned agent");
                        outcome.spawned += 1;
                    }
                    Err(e) => {
                        warn!(%role, error = %e, "Agent spawn failed");
                        outcome.errors += 1;
                    }
                }
            }
            FleetCommand::Terminate { agent_id } => {
                match fleet.terminate_agent(&agent_id).await {
                    Ok(()) => {
                        info!(%agent_id, "Terminated agent");
                        outcome.terminated.push(agent_id);
                    }
                    Err(e) => {
                        warn!(%agent_id, error = %e, "Agent termination failed");
                        outcome.errors += 1;
                    }
                }
            }
        }
    }
    outcome
}

/// Fixed-policy scaling loop: one spawn per tick while the backlog is
/// above threshold, and a terminate for every agent idle past the
/// idle threshold.
pub struct ElasticScalingEngine {
    fleet: Arc<dyn FleetControl>,
    backlog: Arc<dyn MetricSource>,
    config: ScalingConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl ElasticScalingEngine {
    pub fn new(
        fleet: Arc<dyn FleetControl>,
        backlog: Arc<dyn MetricSource>,
        config: ScalingConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            fleet,
            backlog,
            config,
            shutdown_tx,
        }
    }

    /// Spawn the periodic loop. Ticks every `tick_interval_secs` until
    /// [`shutdown`](Self::shutdown) is called.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = Duration::from_secs(self.config.tick_interval_secs);
        info!(interval_secs = self.config.tick_interval_secs, "Scaling engine starting");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first interval tick fires immediately; skip it so the
            // loop waits a full period before acting.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = engine.tick().await;
                        debug!(
                            spawned = outcome.spawned,
                            terminated = outcome.terminated.len(),
                            errors = outcome.errors,
                            "Scaling tick finished"
                        );
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Scaling engine stopped");
                        break;
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// One control-loop pass. Infallible: failures are logged and
    /// reflected in the outcome's error count.
    pub async fn tick(&self) -> ScalingOutcome {
        let mut commands = Vec::new();
        let mut errors = 0u32;

        let backlog = match self.backlog.value(BACKLOG_METRIC).await {
            Ok(count) => count,
            Err(e) => {
                // A failed read must not kill the tick.
                warn!(error = %e, "Backlog read failed, treating as empty");
                0
            }
        };
        if backlog > self.config.backlog_threshold {
            debug!(backlog, threshold = self.config.backlog_threshold, "Backlog over threshold");
            commands.push(FleetCommand::Spawn {
                role: WORKER_TEMPLATE.to_string(),
                task: BACKLOG_TASK.to_string(),
            });
        }

        match self.fleet.get_agent_metrics().await {
            Ok(metrics) => {
                for agent in &metrics.agents {
                    if agent.idle_seconds > self.config.idle_threshold_secs {
                        commands.push(FleetCommand::Terminate {
                            agent_id: agent.id.clone(),
                        });
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Fleet telemetry fetch failed");
                errors += 1;
            }
        }

        let mut outcome = apply_commands(self.fleet.as_ref(), commands).await;
        outcome.errors += errors;
        outcome
    }
}

/// Rules-file-driven scaling loop.
///
/// Each rule watches one named metric: at or above `threshold` the
/// rule's `action` fires for `count` agents of its template, capped at
/// `max_agents_per_template` concurrent instances; at or below
/// `cooldown_threshold` the `cooldown_action` fires for at most one
/// agent per tick, so a noisy metric cannot flush the fleet.
pub struct RuleScalingEngine {
    fleet: Arc<dyn FleetControl>,
    metrics: Arc<dyn MetricSource>,
    rules: Vec<ScalingRule>,
    max_per_template: u64,
}

impl RuleScalingEngine {
    pub fn new(
        fleet: Arc<dyn FleetControl>,
        metrics: Arc<dyn MetricSource>,
        rules: Vec<ScalingRule>,
        max_per_template: u64,
    ) -> Self {
        Self {
            fleet,
            metrics,
            rules,
            max_per_template,
        }
    }

    /// Evaluate every rule against its metric and apply the resulting
    /// commands. Infallible, like [`ElasticScalingEngine::tick`].
    pub async fn tick(&self) -> ScalingOutcome {
        let mut errors = 0u32;
        let fleet_metrics = match self.fleet.get_agent_metrics().await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "Fleet telemetry fetch failed, skipping rule tick");
                return ScalingOutcome {
                    errors: 1,
                    ..ScalingOutcome::default()
                };
            }
        };

        let mut active = count_by_template(&fleet_metrics);
        let mut terminated_templates: Vec<String> = Vec::new();
        let mut commands = Vec::new();

        for rule in &self.rules {
            let value = match self.metrics.value(&rule.metric).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(metric = %rule.metric, error = %e, "Metric unavailable, rule skipped");
                    errors += 1;
                    continue;
                }
            };
            commands.extend(evaluate_rule(
                rule,
                value,
                &fleet_metrics,
                &mut active,
                &mut terminated_templates,
                self.max_per_template,
            ));
        }

        let mut outcome = apply_commands(self.fleet.as_ref(), commands).await;
        outcome.errors += errors;
        outcome
    }
}

fn count_by_template(metrics: &FleetMetrics) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for agent in &metrics.agents {
        if let Some(template) = &agent.template {
            *counts.entry(template.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// Turn one rule + metric value into concrete commands, honoring the
/// per-template cap and the one-terminate-per-template-per-tick limit.
fn evaluate_rule(
    rule: &ScalingRule,
    value: u64,
    fleet_metrics: &FleetMetrics,
    active: &mut HashMap<String, u64>,
    terminated_templates: &mut Vec<String>,
    max_per_template: u64,
) -> Vec<FleetCommand> {
    let action = if value >= rule.threshold {
        rule.action
    } else if value <= rule.cooldown_threshold {
        rule.cooldown_action
    } else {
        ScalingAction::None
    };

    match action {
        ScalingAction::Spawn => {
            let current = active.get(&rule.agent_template).copied().unwrap_or(0);
            let headroom = max_per_template.saturating_sub(current);
            let n = u64::from(rule.count).min(headroom);
            if n < u64::from(rule.count) {
                debug!(
                    template = %rule.agent_template,
                    cap = max_per_template,
                    "Spawn request clamped by per-template cap"
                );
            }
            *active.entry(rule.agent_template.clone()).or_insert(0) += n;
            (0..n)
                .map(|_| FleetCommand::Spawn {
                    role: rule.agent_template.clone(),
                    task: format!("Handle {}", rule.metric),
                })
                .collect()
        }
        ScalingAction::Terminate => {
            if terminated_templates.contains(&rule.agent_template) {
                return vec![];
            }
            // Most-idle instance of the template goes first.
            let victim = fleet_metrics
                .agents
                .iter()
                .filter(|a| a.template.as_deref() == Some(rule.agent_template.as_str()))
                .max_by_key(|a| a.idle_seconds);
            match victim {
                Some(agent) => {
                    terminated_templates.push(rule.agent_template.clone());
                    if let Some(count) = active.get_mut(&rule.agent_template) {
                        *count = count.saturating_sub(1);
                    }
                    vec![FleetCommand::Terminate {
                        agent_id: agent.id.clone(),
                    }]
                }
                None => vec![],
            }
        }
        ScalingAction::None => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AgentMetric;
    use crate::domain::ports::FleetError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockFleet {
        metrics: FleetMetrics,
        fail_spawn: bool,
        spawns: Mutex<Vec<String>>,
        terminations: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FleetControl for MockFleet {
        async fn get_agent_metrics(&self) -> Result<FleetMetrics, FleetError> {
            Ok(self.metrics.clone())
        }

        async fn spawn_subagent(
            &self,
            role: &str,
            _task: &str,
            _parent_agent_id: Option<&str>,
        ) -> Result<(), FleetError> {
            if self.fail_spawn {
                return Err(FleetError::Rpc("spawn refused".to_string()));
            }
            self.spawns.lock().unwrap().push(role.to_string());
            Ok(())
        }

        async fn terminate_agent(&self, agent_id: &str) -> Result<(), FleetError> {
            self.terminations.lock().unwrap().push(agent_id.to_string());
            Ok(())
        }
    }

    struct MapMetrics(HashMap<String, u64>);

    #[async_trait]
    impl MetricSource for MapMetrics {
        async fn value(&self, metric: &str) -> anyhow::Result<u64> {
            self.0
                .get(metric)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("no metric {metric}"))
        }
    }

    fn agent(id: &str, idle: u64, template: Option<&str>) -> AgentMetric {
        AgentMetric {
            id: id.to_string(),
            idle_seconds: idle,
            template: template.map(String::from),
        }
    }

    fn elastic(fleet: Arc<MockFleet>, backlog: u64) -> ElasticScalingEngine {
        let mut map = HashMap::new();
        map.insert(BACKLOG_METRIC.to_string(), backlog);
        ElasticScalingEngine::new(fleet, Arc::new(MapMetrics(map)), ScalingConfig::default())
    }

    #[tokio::test]
    async fn test_backlog_over_threshold_spawns_one_worker() {
        let fleet = Arc::new(MockFleet::default());
        let outcome = elastic(Arc::clone(&fleet), 12).tick().await;
        assert_eq!(outcome.spawned, 1);
        assert_eq!(fleet.spawns.lock().unwrap().as_slice(), ["Worker"]);
    }

    #[tokio::test]
    async fn test_backlog_at_or_under_threshold_spawns_nothing() {
        let fleet = Arc::new(MockFleet::default());
        let outcome = elastic(Arc::clone(&fleet), 5).tick().await;
        assert_eq!(outcome.spawned, 0);
        assert!(fleet.spawns.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_idle_agents_past_threshold_are_terminated() {
        let fleet = Arc::new(MockFleet {
            metrics: FleetMetrics {
                total_agents: 3,
                agents: vec![
                    agent("a1", 301, None),
                    agent("a2", 299, None),
                    agent("a3", 1000, None),
                ],
            },
            ..MockFleet::default()
        });
        let outcome = elastic(Arc::clone(&fleet), 0).tick().await;
        assert_eq!(outcome.terminated, vec!["a1", "a3"]);
        assert_eq!(fleet.terminations.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_backlog_metric_is_treated_as_zero() {
        let fleet = Arc::new(MockFleet::default());
        let engine = ElasticScalingEngine::new(
            Arc::clone(&fleet) as Arc<dyn FleetControl>,
            Arc::new(MapMetrics(HashMap::new())),
            ScalingConfig::default(),
        );
        let outcome = engine.tick().await;
        assert_eq!(outcome.spawned, 0);
        assert_eq!(outcome.errors, 0);
    }

    #[tokio::test]
    async fn test_spawn_rpc_failure_is_counted_not_fatal() {
        let fleet = Arc::new(MockFleet {
            fail_spawn: true,
            ..MockFleet::default()
        });
        let outcome = elastic(Arc::clone(&fleet), 100).tick().await;
        assert_eq!(outcome.spawned, 0);
        assert_eq!(outcome.errors, 1);
    }

    fn rule(metric: &str, template: &str, count: u32) -> ScalingRule {
        ScalingRule {
            metric: metric.to_string(),
            threshold: 10,
            cooldown_threshold: 2,
            action: ScalingAction::Spawn,
            cooldown_action: ScalingAction::Terminate,
            agent_template: template.to_string(),
            count,
        }
    }

    #[tokio::test]
    async fn test_rule_spawns_count_agents_when_threshold_met() {
        let fleet = Arc::new(MockFleet::default());
        let mut map = HashMap::new();
        map.insert("backlog-bugs".to_string(), 15);
        let engine = RuleScalingEngine::new(
            Arc::clone(&fleet) as Arc<dyn FleetControl>,
            Arc::new(MapMetrics(map)),
            vec![rule("backlog-bugs", "triage", 2)],
            5,
        );
        let outcome = engine.tick().await;
        assert_eq!(outcome.spawned, 2);
        assert_eq!(fleet.spawns.lock().unwrap().as_slice(), ["triage", "triage"]);
    }

    #[tokio::test]
    async fn test_rule_spawn_respects_per_template_cap() {
        let fleet = Arc::new(MockFleet {
            metrics: FleetMetrics {
                total_agents: 4,
                agents: (0..4)
                    .map(|i| agent(&format!("t{i}"), 0, Some("triage")))
                    .collect(),
            },
            ..MockFleet::default()
        });
        let mut map = HashMap::new();
        map.insert("backlog-bugs".to_string(), 15);
        let engine = RuleScalingEngine::new(
            Arc::clone(&fleet) as Arc<dyn FleetControl>,
            Arc::new(MapMetrics(map)),
            vec![rule("backlog-bugs", "triage", 3)],
            5,
        );
        let outcome = engine.tick().await;
        // 4 already running, cap 5: only one slot left.
        assert_eq!(outcome.spawned, 1);
    }

    #[tokio::test]
    async fn test_rule_cooldown_terminates_at_most_one_per_template() {
        let fleet = Arc::new(MockFleet {
            metrics: FleetMetrics {
                total_agents: 3,
                agents: vec![
                    agent("t0", 50, Some("triage")),
                    agent("t1", 500, Some("triage")),
                    agent("t2", 200, Some("triage")),
                ],
            },
            ..MockFleet::default()
        });
        let mut map = HashMap::new();
        map.insert("backlog-bugs".to_string(), 1);
        map.insert("backlog-features".to_string(), 0);
        let engine = RuleScalingEngine::new(
            Arc::clone(&fleet) as Arc<dyn FleetControl>,
            Arc::new(MapMetrics(map)),
            vec![
                rule("backlog-bugs", "triage", 1),
                rule("backlog-features", "triage", 1),
            ],
            5,
        );
        let outcome = engine.tick().await;
        // Two cooling rules on the same template still retire only the
        // single most-idle instance.
        assert_eq!(outcome.terminated, vec!["t1"]);
    }

    #[tokio::test]
    async fn test_rule_between_thresholds_does_nothing() {
        let fleet = Arc::new(MockFleet::default());
        let mut map = HashMap::new();
        map.insert("backlog-bugs".to_string(), 5);
        let engine = RuleScalingEngine::new(
            Arc::clone(&fleet) as Arc<dyn FleetControl>,
            Arc::new(MapMetrics(map)),
            vec![rule("backlog-bugs", "triage", 1)],
            5,
        );
        let outcome = engine.tick().await;
        assert_eq!(outcome, ScalingOutcome::default());
    }

    #[tokio::test]
    async fn test_missing_rule_metric_skips_only_that_rule() {
        let fleet = Arc::new(MockFleet::default());
        let mut map = HashMap::new();
        map.insert("known".to_string(), 15);
        let engine = RuleScalingEngine::new(
            Arc::clone(&fleet) as Arc<dyn FleetControl>,
            Arc::new(MapMetrics(map)),
            vec![rule("unknown", "a", 1), rule("known", "b", 1)],
            5,
        );
        let outcome = engine.tick().await;
        assert_eq!(outcome.errors, 1);
        assert_eq!(outcome.spawned, 1);
    }

    #[tokio::test]
    async fn test_start_and_shutdown_round_trip() {
        let fleet = Arc::new(MockFleet::default());
        let engine = Arc::new(elastic(fleet, 0));
        let handle = engine.start();
        engine.shutdown();
        handle.await.unwrap();
    }
}
