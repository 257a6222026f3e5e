//! Polling Engine (C10, `spec.md` §4.10). Periodically discovers
//! actionable issues, runs the four-step claim protocol, and hands
//! claimed issues to the Coordinator Gateway (C6). A single poll cycle
//! processes issues oldest-first and sequentially, to keep the forge API
//! budget predictable (`spec.md` §4.10).
//!
//! The claim-label race in step 3 assumes a single bot identity per
//! deployment (`spec.md` §9 Open Questions leaves the cross-process case
//! unresolved); `ForgePort` has no comment-listing operation to compare
//! timestamps against a competing claimant, so label presence on refetch
//! is treated as sufficient confirmation — documented in `DESIGN.md`.

use std::sync::Arc;

use crate::domain::errors::CoreError;
use crate::domain::models::labels::{claim_label, AGENT_READY, SKIP_LABELS};
use crate::domain::models::{Issue, IssueRef};

use super::coordinator_gateway::CoordinatorGateway;
use super::execution_dispatcher::ExecutionDispatcher;
use super::forge_client::ForgeClient;
use super::pipeline_orchestrator::PipelineOrchestrator;

#[derive(Debug, Default)]
pub struct PollSummary {
    pub claimed: Vec<IssueRef>,
    pub skipped: Vec<(IssueRef, String)>,
}

pub struct PollingEngine {
    forge: Arc<ForgeClient>,
    orchestrator: Arc<PipelineOrchestrator>,
    gateway: Arc<CoordinatorGateway>,
    dispatcher: Arc<ExecutionDispatcher>,
    bot_identity: String,
    repo_id: String,
}

impl PollingEngine {
    pub fn new(
        forge: Arc<ForgeClient>,
        orchestrator: Arc<PipelineOrchestrator>,
        gateway: Arc<CoordinatorGateway>,
        dispatcher: Arc<ExecutionDispatcher>,
        bot_identity: String,
        repo_id: String,
    ) -> Self {
        Self {
            forge,
            orchestrator,
            gateway,
            dispatcher,
            bot_identity,
            repo_id,
        }
    }

    pub async fn poll_once(&self) -> Result<PollSummary, CoreError> {
        let labelled = self.forge.list_issues(&self.repo_id, AGENT_READY).await?;
        let assigned = self
            .forge
            .list_issues_by_assignee(&self.repo_id, &self.bot_identity)
            .await?;

        let mut seen = std::collections::HashSet::new();
        let mut issues = Vec::new();
        for issue in labelled.into_iter().chain(assigned) {
            if seen.insert(issue.issue_ref.clone()) {
                issues.push(issue);
            }
        }
        issues.sort_by_key(|i| i.issue_ref.issue_number);

        let mut summary = PollSummary::default();
        for issue in issues {
            match self.try_claim(&issue).await {
                Ok(true) => summary.claimed.push(issue.issue_ref.clone()),
                Ok(false) => {}
                Err(reason) => summary.skipped.push((issue.issue_ref.clone(), reason)),
            }
        }
        Ok(summary)
    }

    fn skip_reason(&self, issue: &Issue) -> Option<String> {
        if issue.is_pull_request {
            return Some("is a pull request".to_string());
        }
        if let Some(label) = SKIP_LABELS.iter().find(|l| issue.has_label(l)) {
            return Some(format!("carries skip label '{label}'"));
        }
        let our_claim = claim_label(&self.bot_identity);
        if issue.has_label(&our_claim) {
            return Some("already claimed by this bot identity".to_string());
        }
        if issue.labels.iter().any(|l| l.starts_with("claimed-by-")) {
            return Some("already claimed by another identity".to_string());
        }
        None
    }

    /// Runs the four-step claim protocol. `Ok(true)` means claimed and
    /// handed to C6; `Ok(false)` means silently skipped (closed skip-
    /// condition set); `Err` carries a user-facing reason for a failed
    /// claim attempt (e.g. a lost race).
    async fn try_claim(&self, issue: &Issue) -> Result<bool, String> {
        if let Some(reason) = self.skip_reason(issue) {
            return Ok(false);
        }

        if self.orchestrator.has_non_terminal(&issue.issue_ref).await {
            return Ok(false);
        }

        let our_claim = claim_label(&self.bot_identity);
        self.forge
            .add_label(&issue.issue_ref.repo_id, issue.issue_ref.issue_number, &our_claim)
            .await
            .map_err(|e| format!("claim label add failed: {e}"))?;

        let refetched = self
            .forge
            .get_issue(&issue.issue_ref.repo_id, issue.issue_ref.issue_number)
            .await
            .map_err(|e| format!("refetch after claim failed: {e}"))?;

        if !refetched.has_label(&our_claim) {
            return Err("claim label not present on refetch".to_string());
        }

        let competing = refetched
            .labels
            .iter()
            .any(|l| l.starts_with("claimed-by-") && l != &our_claim);
        if competing {
            let _ = self
                .forge
                .remove_label(&issue.issue_ref.repo_id, issue.issue_ref.issue_number, &our_claim)
                .await;
            return Err("lost claim race to a competing claimant".to_string());
        }

        self.orchestrator.create_claimed(issue.issue_ref.clone()).await;

        let (decision, comment_posted) = self
            .gateway
            .route(&refetched)
            .await
            .map_err(|e| format!("coordinator gateway failed: {e}"))?;
        self.orchestrator
            .record_decision(&issue.issue_ref, decision.clone(), comment_posted)
            .await;
        if let super::execution_dispatcher::DispatchOutcome::Rejected(reason) = self.dispatcher.dispatch(&decision).await {
            tracing::warn!(issue = %issue.issue_ref, reason, "dispatch rejected after routing");
        }

        Ok(true)
    }

    /// Retries posting the explanatory comment for any Pipeline Record
    /// whose decision comment never confirmed posting (`spec.md` §4.6,
    /// §9). Returns how many were newly posted this call.
    pub async fn retry_pending_decision_comments(&self) -> usize {
        let pending = self.orchestrator.records_missing_decision_comment().await;
        let mut retried = 0;
        for record in pending {
            let Some(decision) = &record.decision else { continue };
            if self
                .gateway
                .retry_decision_comment(&record.issue_ref, &decision.explanatory_text)
                .await
            {
                self.orchestrator.mark_decision_comment_posted(&record.issue_ref).await;
                retried += 1;
            }
        }
        retried
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::RateLimitConfig;
    use crate::domain::ports::clock::SystemClock;
    use crate::domain::ports::forge::{CreatedRef, RateLimitStatus};
    use crate::domain::ports::ForgePort;
    use crate::infrastructure::persistence::{PipelineStore, RateLogMirror};
    use crate::services::agent_registry::AgentRegistry;
    use crate::services::monitoring_bus::MonitoringBus;
    use crate::services::rate_limiter::RateLimiter;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeForge {
        issues: Mutex<HashMap<u64, Issue>>,
    }

    #[async_trait]
    impl ForgePort for FakeForge {
        async fn list_issues(&self, _repo_id: &str, label: &str) -> Result<Vec<Issue>, CoreError> {
            Ok(self
                .issues
                .lock()
                .unwrap()
                .values()
                .filter(|i| i.has_label(label))
                .cloned()
                .collect())
        }
        async fn list_issues_by_assignee(&self, _repo_id: &str, assignee: &str) -> Result<Vec<Issue>, CoreError> {
            Ok(self
                .issues
                .lock()
                .unwrap()
                .values()
                .filter(|i| i.assignee_logins.iter().any(|a| a == assignee))
                .cloned()
                .collect())
        }
        async fn get_issue(&self, _repo_id: &str, issue_number: u64) -> Result<Issue, CoreError> {
            self.issues
                .lock()
                .unwrap()
                .get(&issue_number)
                .cloned()
                .ok_or_else(|| CoreError::ForgeUnavailable("not found".into()))
        }
        async fn create_label(&self, _: &str, _: &str, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn delete_label(&self, _: &str, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn add_label(&self, _repo_id: &str, issue_number: u64, label: &str) -> Result<(), CoreError> {
            let mut issues = self.issues.lock().unwrap();
            if let Some(issue) = issues.get_mut(&issue_number) {
                if !issue.has_label(label) {
                    issue.labels.push(label.to_string());
                }
            }
            Ok(())
        }
        async fn remove_label(&self, _repo_id: &str, issue_number: u64, label: &str) -> Result<(), CoreError> {
            let mut issues = self.issues.lock().unwrap();
            if let Some(issue) = issues.get_mut(&issue_number) {
                issue.labels.retain(|l| l != label);
            }
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

    fn issue(number: u64, labels: &[&str]) -> Issue {
        Issue {
            issue_ref: IssueRef::new("acme/widgets", number),
            title: "Fix typo".into(),
            body: "trivial".into(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            is_pull_request: false,
            assignee_logins: Vec::new(),
        }
    }

    async fn engine(issues: Vec<Issue>) -> PollingEngine {
        let fake_forge = Arc::new(FakeForge {
            issues: Mutex::new(issues.into_iter().map(|i| (i.issue_ref.issue_number, i)).collect()),
        });
        let limiter = Arc::new(RateLimiter::new(
            RateLimitConfig::default(),
            Arc::new(SystemClock),
            RateLogMirror::disabled(),
        ));
        let forge = Arc::new(ForgeClient::new(fake_forge, limiter));
        let store = PipelineStore::new(tempfile::tempdir().unwrap().keep().join("pipelines.json"));
        let orchestrator = Arc::new(
            PipelineOrchestrator::boot(
                store,
                Default::default(),
                60,
                Arc::new(SystemClock),
                Arc::new(MonitoringBus::new()),
            )
            .await
            .unwrap(),
        );
        let agents = Arc::new(AgentRegistry::boot(Vec::new(), 1, 30, Arc::new(SystemClock)).await);
        let gateway = Arc::new(CoordinatorGateway::new(
            forge.clone(),
            agents.clone(),
            HashMap::new(),
            Duration::from_secs(30),
        ));
        let dispatcher = Arc::new(ExecutionDispatcher::new(agents, orchestrator.clone(), 100));
        PollingEngine::new(
            forge,
            orchestrator,
            gateway,
            dispatcher,
            "agent-forge-bot".into(),
            "acme/widgets".into(),
        )
    }

    #[tokio::test]
    async fn claims_an_eligible_issue() {
        let engine = engine(vec![issue(1, &["agent-ready"])]).await;
        let summary = engine.poll_once().await.unwrap();
        assert_eq!(summary.claimed, vec![IssueRef::new("acme/widgets", 1)]);
    }

    #[tokio::test]
    async fn claims_issue_assigned_to_bot_without_label() {
        let mut i = issue(1, &[]);
        i.assignee_logins.push("agent-forge-bot".to_string());
        let engine = engine(vec![i]).await;
        let summary = engine.poll_once().await.unwrap();
        assert_eq!(summary.claimed, vec![IssueRef::new("acme/widgets", 1)]);
    }

    #[tokio::test]
    async fn labelled_and_assigned_issue_is_not_double_counted() {
        let mut i = issue(1, &["agent-ready"]);
        i.assignee_logins.push("agent-forge-bot".to_string());
        let engine = engine(vec![i]).await;
        let summary = engine.poll_once().await.unwrap();
        assert_eq!(summary.claimed, vec![IssueRef::new("acme/widgets", 1)]);
    }

    #[tokio::test]
    async fn skips_wontfix_labeled_issue() {
        let engine = engine(vec![issue(1, &["agent-ready", "wontfix"])]).await;
        let summary = engine.poll_once().await.unwrap();
        assert!(summary.claimed.is_empty());
    }

    #[tokio::test]
    async fn skips_already_claimed_issue() {
        let engine = engine(vec![issue(1, &["agent-ready", "claimed-by-agent-forge-bot"])]).await;
        let summary = engine.poll_once().await.unwrap();
        assert!(summary.claimed.is_empty());
    }

    #[tokio::test]
    async fn skips_pull_requests() {
        let mut i = issue(1, &["agent-ready"]);
        i.is_pull_request = true;
        let engine = engine(vec![i]).await;
        let summary = engine.poll_once().await.unwrap();
        assert!(summary.claimed.is_empty());
    }

    #[tokio::test]
    async fn processes_oldest_issue_number_first() {
        let engine = engine(vec![issue(5, &["agent-ready"]), issue(2, &["agent-ready"])]).await;
        let summary = engine.poll_once().await.unwrap();
        assert_eq!(
            summary.claimed,
            vec![IssueRef::new("acme/widgets", 2), IssueRef::new("acme/widgets", 5)]
        );
    }
}
