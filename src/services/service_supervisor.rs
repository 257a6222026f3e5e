//! Service Supervisor (C11, `spec.md` §4.11). Boots the Polling Engine
//! (C10), Pipeline Orchestrator (C9) maintenance sweeps, and Monitoring
//! Bus (C12) health ticks in dependency order, and owns graceful
//! shutdown. Grounded on the teacher's `cli/commands/swarm.rs` run loop
//! (`tokio::signal::ctrl_c()` then a bounded stop sequence), extended to
//! also catch `SIGTERM` since this process is meant to run under a
//! process supervisor, not just an interactive terminal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;

use super::monitoring_bus::{MonitoringBus, MonitoringEvent};
use super::pipeline_orchestrator::PipelineOrchestrator;
use super::polling_engine::PollingEngine;

#[derive(Debug, Clone)]
pub struct ComponentHealth {
    pub name: String,
    pub healthy: bool,
    pub last_tick: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct HealthSnapshot {
    pub components: Vec<ComponentHealth>,
}

pub struct ServiceSupervisor {
    polling: Arc<PollingEngine>,
    orchestrator: Arc<PipelineOrchestrator>,
    bus: Arc<MonitoringBus>,
    poll_interval: Duration,
    shutdown_grace: Duration,
    health: RwLock<HashMap<String, ComponentHealth>>,
}

impl ServiceSupervisor {
    pub fn new(
        polling: Arc<PollingEngine>,
        orchestrator: Arc<PipelineOrchestrator>,
        bus: Arc<MonitoringBus>,
        poll_interval: Duration,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            polling,
            orchestrator,
            bus,
            poll_interval,
            shutdown_grace,
            health: RwLock::new(HashMap::new()),
        }
    }

    async fn record_tick(&self, component: &str, healthy: bool) {
        let now = Utc::now();
        self.health.write().await.insert(
            component.to_string(),
            ComponentHealth {
                name: component.to_string(),
                healthy,
                last_tick: now,
            },
        );
        self.bus.publish(MonitoringEvent::HealthTick {
            timestamp: now,
            component: component.to_string(),
            healthy,
        });
    }

    pub async fn health_snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            components: self.health.read().await.values().cloned().collect(),
        }
    }

    /// Runs until `SIGTERM`/`SIGINT`, then drains in-flight pipelines for
    /// up to `shutdown_grace` before returning.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut poll_tick = tokio::time::interval(self.poll_interval);
        poll_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sweep_tick = tokio::time::interval(Duration::from_secs(60));
        sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        #[cfg(unix)]
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        loop {
            #[cfg(unix)]
            let shutdown = async { sigterm.recv().await };
            #[cfg(not(unix))]
            let shutdown = std::future::pending::<Option<()>>();

            tokio::select! {
                _ = poll_tick.tick() => {
                    match self.polling.poll_once().await {
                        Ok(summary) => {
                            tracing::info!(claimed = summary.claimed.len(), skipped = summary.skipped.len(), "poll cycle complete");
                            self.record_tick("polling_engine", true).await;
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "poll cycle failed");
                            self.record_tick("polling_engine", false).await;
                        }
                    }
                }
                _ = sweep_tick.tick() => {
                    let abandoned = self.orchestrator.sweep_expired_claims().await;
                    if !abandoned.is_empty() {
                        tracing::info!(count = abandoned.len(), "abandoned stale claims past TTL");
                    }
                    let retried = self.polling.retry_pending_decision_comments().await;
                    if retried > 0 {
                        tracing::info!(count = retried, "posted previously-failed decision comments");
                    }
                    self.record_tick("pipeline_orchestrator", true).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received ctrl-c, shutting down");
                    break;
                }
                _ = shutdown => {
                    tracing::info!("received SIGTERM, shutting down");
                    break;
                }
            }
        }

        self.drain(self.shutdown_grace).await;
        Ok(())
    }

    /// Waits for in-flight (`executing`) pipelines to leave that phase, up
    /// to `grace`, then returns regardless — every mutation already
    /// persists through `PipelineOrchestrator`, so nothing is lost even if
    /// the grace period is too short.
    async fn drain(&self, grace: Duration) {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let still_executing = self
                .orchestrator
                .snapshot()
                .await
                .iter()
                .filter(|r| r.phase == crate::domain::models::PipelinePhase::Executing)
                .count();
            if still_executing == 0 || tokio::time::Instant::now() >= deadline {
                if still_executing > 0 {
                    tracing::warn!(count = still_executing, "shutdown grace period elapsed with pipelines still executing");
                }
                return;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::CoreError;
    use crate::domain::models::config::{RateLimitConfig, RetryConfig};
    use crate::domain::models::{Issue, IssueRef, PipelinePhase};
    use crate::domain::ports::clock::SystemClock;
    use crate::domain::ports::forge::{CreatedRef, RateLimitStatus};
    use crate::domain::ports::ForgePort;
    use crate::infrastructure::persistence::{PipelineStore, RateLogMirror};
    use crate::services::agent_registry::AgentRegistry;
    use crate::services::coordinator_gateway::CoordinatorGateway;
    use crate::services::forge_client::ForgeClient;
    use async_trait::async_trait;
    use std::collections::HashMap as StdHashMap;

    struct EmptyForge;

    #[async_trait]
    impl ForgePort for EmptyForge {
        async fn list_issues(&self, _: &str, _: &str) -> Result<Vec<Issue>, CoreError> {
            Ok(Vec::new())
        }
        async fn list_issues_by_assignee(&self, _: &str, _: &str) -> Result<Vec<Issue>, CoreError> {
            Ok(Vec::new())
        }
        async fn get_issue(&self, repo_id: &str, issue_number: u64) -> Result<Issue, CoreError> {
            Ok(Issue {
                issue_ref: IssueRef::new(repo_id, issue_number),
                title: String::new(),
                body: String::new(),
                labels: Vec::new(),
                is_pull_request: false,
                assignee_logins: Vec::new(),
            })
        }
        async fn create_label(&self, _: &str, _: &str, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn delete_label(&self, _: &str, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn add_label(&self, _: &str, _: u64, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn remove_label(&self, _: &str, _: u64, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn create_comment(&self, _: &str, _: u64, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn create_branch(&self, _: &str, _: &str, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn delete_branch(&self, _: &str, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn create_pull_request(&self, _: &str, _: &str, _: &str, _: &str, _: &str) -> Result<CreatedRef, CoreError> {
            Ok(CreatedRef { number: 1, url: String::new() })
        }
        async fn merge_pull_request(&self, _: &str, _: u64) -> Result<(), CoreError> {
            Ok(())
        }
        async fn get_authenticated_user(&self) -> Result<String, CoreError> {
            Ok("agent-forge-bot".into())
        }
        async fn get_rate_limit_status(&self) -> Result<RateLimitStatus, CoreError> {
            Ok(RateLimitStatus { limit: 5000, remaining: 4999, reset_unix_secs: 0 })
        }
    }

    async fn supervisor(dir: &std::path::Path) -> ServiceSupervisor {
        let limiter = Arc::new(super::super::rate_limiter::RateLimiter::new(
            RateLimitConfig::default(),
            Arc::new(SystemClock),
            RateLogMirror::disabled(),
        ));
        let forge = Arc::new(ForgeClient::new(Arc::new(EmptyForge), limiter));
        let store = PipelineStore::new(dir.join("pipelines.json"));
        let bus = Arc::new(MonitoringBus::new());
        let orchestrator = Arc::new(
            PipelineOrchestrator::boot(store, RetryConfig::default(), 60, Arc::new(SystemClock), bus.clone())
                .await
                .unwrap(),
        );
        let agents = Arc::new(AgentRegistry::boot(Vec::new(), 1, 30, Arc::new(SystemClock)).await);
        let gateway = Arc::new(CoordinatorGateway::new(
            forge.clone(),
            agents.clone(),
            StdHashMap::new(),
            Duration::from_secs(30),
        ));
        let dispatcher = Arc::new(super::super::execution_dispatcher::ExecutionDispatcher::new(
            agents,
            orchestrator.clone(),
            100,
        ));
        let polling = Arc::new(PollingEngine::new(
            forge,
            orchestrator.clone(),
            gateway,
            dispatcher,
            "agent-forge-bot".into(),
            "acme/widgets".into(),
        ));
        ServiceSupervisor::new(polling, orchestrator, bus, Duration::from_secs(300), Duration::from_millis(500))
    }

    #[tokio::test]
    async fn drain_returns_immediately_when_nothing_is_executing() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(dir.path()).await;
        let started = tokio::time::Instant::now();
        sup.drain(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn drain_gives_up_after_grace_period_if_still_executing() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(dir.path()).await;
        let issue_ref = IssueRef::new("acme/widgets", 1);
        sup.orchestrator.create_claimed(issue_ref.clone()).await;
        sup.orchestrator.transition(&issue_ref, PipelinePhase::Analyzed).await;
        sup.orchestrator.transition(&issue_ref, PipelinePhase::Dispatched).await;
        sup.orchestrator.transition(&issue_ref, PipelinePhase::Executing).await;

        let started = tokio::time::Instant::now();
        sup.drain(Duration::from_millis(200)).await;
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn record_tick_surfaces_in_health_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor(dir.path()).await;
        sup.record_tick("polling_engine", true).await;
        let snapshot = sup.health_snapshot().await;
        assert_eq!(snapshot.components.len(), 1);
        assert!(snapshot.components[0].healthy);
        assert_eq!(snapshot.components[0].name, "polling_engine");
    }
}
