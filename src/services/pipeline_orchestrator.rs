//! Pipeline Orchestrator (C9, `spec.md` §4.9). Owns every Pipeline Record
//! from claim to terminal state, persists on every transition (write-temp-
//! then-rename via `PipelineStore`), and rehydrates on boot — any
//! non-terminal record older than the claim TTL is abandoned and its
//! claim released.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tokio::sync::RwLock;

use crate::domain::models::config::RetryConfig;
use crate::domain::models::{IssueRef, PipelinePhase, PipelineRecord, RoutingDecision};
use crate::domain::ports::Clock;
use crate::infrastructure::persistence::PipelineStore;

use super::monitoring_bus::{MonitoringBus, MonitoringEvent};

pub struct PipelineOrchestrator {
    store: PipelineStore,
    records: RwLock<HashMap<IssueRef, PipelineRecord>>,
    retry: RetryConfig,
    claim_ttl: ChronoDuration,
    clock: Arc<dyn Clock>,
    bus: Arc<MonitoringBus>,
}

/// Pure: `base_secs * 2^(attempts-1)`, capped at `cap_secs`
/// (`spec.md` §4.9: base 30s, cap 10min).
pub fn backoff_duration(attempts: u32, base_secs: u64, cap_secs: u64) -> ChronoDuration {
    let exponent = attempts.saturating_sub(1).min(32);
    let scaled = base_secs.saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX));
    ChronoDuration::seconds(scaled.min(cap_secs) as i64)
}

impl PipelineOrchestrator {
    pub async fn boot(
        store: PipelineStore,
        retry: RetryConfig,
        claim_ttl_minutes: i64,
        clock: Arc<dyn Clock>,
        bus: Arc<MonitoringBus>,
    ) -> std::io::Result<Self> {
        let mut loaded = store.load()?;
        let claim_ttl = ChronoDuration::minutes(claim_ttl_minutes);
        let now = clock.now();

        for record in loaded.values_mut() {
            if !record.phase.is_terminal() && now - record.updated_at > claim_ttl {
                let _ = record.transition(PipelinePhase::Abandoned, now);
            }
        }
        store.save(&loaded)?;

        Ok(Self {
            store,
            records: RwLock::new(loaded),
            retry,
            claim_ttl,
            clock,
            bus,
        })
    }

    async fn persist(&self, records: &HashMap<IssueRef, PipelineRecord>) {
        if let Err(err) = self.store.save(records) {
            tracing::error!(error = %err, "pipeline store save failed");
        }
    }

    pub async fn has_non_terminal(&self, issue_ref: &IssueRef) -> bool {
        self.records
            .read()
            .await
            .get(issue_ref)
            .is_some_and(|r| !r.phase.is_terminal())
    }

    pub async fn get(&self, issue_ref: &IssueRef) -> Option<PipelineRecord> {
        self.records.read().await.get(issue_ref).cloned()
    }

    pub async fn create_claimed(&self, issue_ref: IssueRef) -> PipelineRecord {
        let now = self.clock.now();
        let record = PipelineRecord::new(issue_ref.clone(), now);
        let mut records = self.records.write().await;
        records.insert(issue_ref, record.clone());
        self.persist(&records).await;
        record
    }

    async fn transition_locked(
        &self,
        records: &mut HashMap<IssueRef, PipelineRecord>,
        issue_ref: &IssueRef,
        next: PipelinePhase,
    ) -> bool {
        let Some(record) = records.get_mut(issue_ref) else {
            return false;
        };
        let from = record.phase;
        let now = self.clock.now();
        if !record.transition(next, now) {
            return false;
        }
        self.bus.publish(MonitoringEvent::PipelineTransition {
            timestamp: now,
            issue_ref: issue_ref.clone(),
            from,
            to: next,
        });
        true
    }

    pub async fn transition(&self, issue_ref: &IssueRef, next: PipelinePhase) -> bool {
        let mut records = self.records.write().await;
        let ok = self.transition_locked(&mut records, issue_ref, next).await;
        if ok {
            self.persist(&records).await;
        }
        ok
    }

    pub async fn record_decision(&self, issue_ref: &IssueRef, decision: RoutingDecision, comment_posted: bool) -> bool {
        let mut records = self.records.write().await;
        let ok = self.transition_locked(&mut records, issue_ref, PipelinePhase::Analyzed).await;
        if ok {
            if let Some(record) = records.get_mut(issue_ref) {
                record.decision = Some(decision);
                record.decision_comment_posted = comment_posted;
            }
            self.persist(&records).await;
        }
        ok
    }

    /// Marks a previously-failed decision comment as now posted, so
    /// `records_missing_decision_comment` stops surfacing it.
    pub async fn mark_decision_comment_posted(&self, issue_ref: &IssueRef) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(issue_ref) {
            record.decision_comment_posted = true;
        }
        self.persist(&records).await;
    }

    /// Records with a Routing Decision whose explanatory comment never
    /// confirmed posting (`spec.md` §4.6's "persistence can be retried
    /// later by C9") — candidates for the Service Supervisor's retry tick.
    pub async fn records_missing_decision_comment(&self) -> Vec<PipelineRecord> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.decision.is_some() && !r.decision_comment_posted)
            .cloned()
            .collect()
    }

    pub async fn record_agent(&self, issue_ref: &IssueRef, agent_id: String) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(issue_ref) {
            record.agent_id = Some(agent_id);
        }
        self.persist(&records).await;
    }

    /// `executing -> failed`; if `attempts < max_attempts`, immediately
    /// makes the record eligible for `retry_or_abandon` to send it back to
    /// `dispatched`. Otherwise callers should call `retry_or_abandon` to
    /// push it to `abandoned`.
    pub async fn record_failure(&self, issue_ref: &IssueRef, error: String) -> bool {
        let mut records = self.records.write().await;
        let ok = self.transition_locked(&mut records, issue_ref, PipelinePhase::Failed).await;
        if ok {
            if let Some(record) = records.get_mut(issue_ref) {
                record.error = Some(error);
                record.attempts += 1;
            }
            self.persist(&records).await;
        }
        ok
    }

    /// Decides whether a `failed` record retries into `dispatched` or
    /// gives up into `abandoned`, per `max_attempts` and exponential
    /// backoff. Returns `None` if the record isn't in `failed`.
    pub async fn retry_or_abandon(&self, issue_ref: &IssueRef) -> Option<PipelinePhase> {
        let attempts = {
            let records = self.records.read().await;
            let record = records.get(issue_ref)?;
            if record.phase != PipelinePhase::Failed {
                return None;
            }
            record.attempts
        };

        let next = if attempts < self.retry.max_attempts {
            PipelinePhase::Dispatched
        } else {
            PipelinePhase::Abandoned
        };

        let mut records = self.records.write().await;
        let ok = self.transition_locked(&mut records, issue_ref, next).await;
        self.persist(&records).await;
        ok.then_some(next)
    }

    pub fn next_retry_delay(&self, attempts: u32) -> ChronoDuration {
        backoff_duration(attempts, self.retry.backoff_base_secs, self.retry.backoff_cap_secs)
    }

    pub async fn abandon(&self, issue_ref: &IssueRef) -> bool {
        let mut records = self.records.write().await;
        let ok = self.transition_locked(&mut records, issue_ref, PipelinePhase::Abandoned).await;
        if ok {
            self.persist(&records).await;
        }
        ok
    }

    pub async fn snapshot(&self) -> Vec<PipelineRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Supervisor-driven sweep: any non-terminal record whose claim TTL
    /// has elapsed since its last update is abandoned (`spec.md` §8,
    /// invariant 7).
    pub async fn sweep_expired_claims(&self) -> Vec<IssueRef> {
        let now = self.clock.now();
        let claim_ttl = self.claim_ttl;
        let mut records = self.records.write().await;
        let expired: Vec<IssueRef> = records
            .iter()
            .filter(|(_, r)| !r.phase.is_terminal() && now - r.updated_at > claim_ttl)
            .map(|(k, _)| k.clone())
            .collect();

        for issue_ref in &expired {
            self.transition_locked(&mut records, issue_ref, PipelinePhase::Abandoned).await;
        }
        self.persist(&records).await;
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::clock::SystemClock;
    use chrono::Utc;

    async fn orchestrator(dir: &std::path::Path) -> PipelineOrchestrator {
        let store = PipelineStore::new(dir.join("pipelines.json"));
        PipelineOrchestrator::boot(
            store,
            RetryConfig::default(),
            60,
            Arc::new(SystemClock),
            Arc::new(MonitoringBus::new()),
        )
        .await
        .unwrap()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_duration(1, 30, 600), ChronoDuration::seconds(30));
        assert_eq!(backoff_duration(2, 30, 600), ChronoDuration::seconds(60));
        assert_eq!(backoff_duration(3, 30, 600), ChronoDuration::seconds(120));
        assert_eq!(backoff_duration(20, 30, 600), ChronoDuration::seconds(600));
    }

    #[tokio::test]
    async fn claim_then_full_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path()).await;
        let issue_ref = IssueRef::new("acme/widgets", 1);
        orch.create_claimed(issue_ref.clone()).await;

        assert!(orch.transition(&issue_ref, PipelinePhase::Analyzed).await);
        assert!(orch.transition(&issue_ref, PipelinePhase::Dispatched).await);
        assert!(orch.transition(&issue_ref, PipelinePhase::Executing).await);
        assert!(orch.transition(&issue_ref, PipelinePhase::Reviewing).await);
        assert!(orch.transition(&issue_ref, PipelinePhase::Merged).await);

        let record = orch.get(&issue_ref).await.unwrap();
        assert!(record.phase.is_terminal());
    }

    #[tokio::test]
    async fn failed_retries_until_max_attempts_then_abandons() {
        let dir = tempfile::tempdir().unwrap();
        let mut retry = RetryConfig::default();
        retry.max_attempts = 2;
        let store = PipelineStore::new(dir.path().join("pipelines.json"));
        let orch = PipelineOrchestrator::boot(store, retry, 60, Arc::new(SystemClock), Arc::new(MonitoringBus::new()))
            .await
            .unwrap();

        let issue_ref = IssueRef::new("acme/widgets", 1);
        orch.create_claimed(issue_ref.clone()).await;
        orch.transition(&issue_ref, PipelinePhase::Analyzed).await;
        orch.transition(&issue_ref, PipelinePhase::Dispatched).await;
        orch.transition(&issue_ref, PipelinePhase::Executing).await;

        orch.record_failure(&issue_ref, "boom".into()).await;
        let next = orch.retry_or_abandon(&issue_ref).await;
        assert_eq!(next, Some(PipelinePhase::Dispatched));

        orch.transition(&issue_ref, PipelinePhase::Executing).await;
        orch.record_failure(&issue_ref, "boom again".into()).await;
        let next = orch.retry_or_abandon(&issue_ref).await;
        assert_eq!(next, Some(PipelinePhase::Abandoned));
    }

    #[tokio::test]
    async fn reboot_abandons_stale_non_terminal_records() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = PipelineStore::new(dir.path().join("pipelines.json"));
            let mut records = HashMap::new();
            let issue_ref = IssueRef::new("acme/widgets", 1);
            let mut record = PipelineRecord::new(issue_ref.clone(), Utc::now() - ChronoDuration::hours(2));
            record.phase = PipelinePhase::Executing;
            record.updated_at = Utc::now() - ChronoDuration::hours(2);
            records.insert(issue_ref, record);
            store.save(&records).unwrap();
        }

        let orch = orchestrator(dir.path()).await;
        let record = orch.get(&IssueRef::new("acme/widgets", 1)).await.unwrap();
        assert_eq!(record.phase, PipelinePhase::Abandoned);
    }
}
