//! Coordinator Gateway (C6, `spec.md` §4.6). The mandatory single entry
//! point for every claimed issue: produces exactly one Routing Decision,
//! never starts agents or touches a workspace itself. Side effects (one
//! label, one comment) are idempotent — re-running on an issue that
//! already carries the decision label is a no-op.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::CoreError;
use crate::domain::models::{AgentRole, Issue, Priority, RoutingAction, RoutingDecision};
use crate::domain::ports::LlmProvider;

use super::agent_registry::{AcquireOutcome, AgentRegistry};
use super::complexity_analyzer::ComplexityAnalyzer;
use super::forge_client::ForgeClient;

pub struct CoordinatorGateway {
    forge: Arc<ForgeClient>,
    agents: Arc<AgentRegistry>,
    llm_providers: HashMap<String, Arc<dyn LlmProvider>>,
    llm_timeout: Duration,
}

impl CoordinatorGateway {
    pub fn new(
        forge: Arc<ForgeClient>,
        agents: Arc<AgentRegistry>,
        llm_providers: HashMap<String, Arc<dyn LlmProvider>>,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            forge,
            agents,
            llm_providers,
            llm_timeout,
        }
    }

    /// Returns the Routing Decision plus whether its explanatory comment
    /// was confirmed posted. A `false` here is not an error: the label
    /// (the durable part of the decision) is already applied, and C9 owns
    /// retrying the comment later via `retry_decision_comment`.
    pub async fn route(&self, issue: &Issue) -> Result<(RoutingDecision, bool), CoreError> {
        let analysis = ComplexityAnalyzer::analyze(issue);
        let mut explanatory_text = analysis.reasoning.clone();

        let (action, role, priority, escalation_enabled) = match analysis.category {
            crate::domain::models::ComplexityCategory::Simple => {
                (RoutingAction::StartCodeAgent, AgentRole::Developer, Priority::Normal, false)
            }
            crate::domain::models::ComplexityCategory::Uncertain => (
                RoutingAction::StartCodeAgentWithEscalation,
                AgentRole::Developer,
                Priority::High,
                true,
            ),
            crate::domain::models::ComplexityCategory::Complex => {
                (RoutingAction::StartCoordinatorOrchestration, AgentRole::Coordinator, Priority::Normal, false)
            }
        };

        if let Some(refinement) = self.try_refine(issue).await {
            explanatory_text = format!("{explanatory_text}\n\ncoordinator notes: {refinement}");
        }

        let decision = RoutingDecision {
            issue_ref: issue.issue_ref.clone(),
            category: analysis.category,
            action,
            agent_role_required: role,
            priority,
            escalation_enabled,
            analysis,
            explanatory_text,
        };

        let comment_posted = self.record_decision(issue, &decision).await;
        Ok((decision, comment_posted))
    }

    /// Retries posting a decision's explanatory comment outside the initial
    /// `route()` call, for issues C9 finds still missing one (`spec.md`
    /// §4.6, §9). Returns whether the comment is now posted.
    pub async fn retry_decision_comment(
        &self,
        issue_ref: &crate::domain::models::IssueRef,
        explanatory_text: &str,
    ) -> bool {
        self.forge
            .create_comment(&issue_ref.repo_id, issue_ref.issue_number, explanatory_text)
            .await
            .map_err(|err| {
                tracing::warn!(issue = %issue_ref, error = %err, "retry of routing decision comment failed");
            })
            .is_ok()
    }

    /// Best-effort semantic refinement via an LLM-backed coordinator
    /// instance. Falls back silently to C5 alone on unavailability or
    /// timeout (`spec.md` §4.6).
    async fn try_refine(&self, issue: &Issue) -> Option<String> {
        let AcquireOutcome::Acquired(handle) = self.agents.acquire(AgentRole::Coordinator, &Default::default()).await
        else {
            return None;
        };

        let provider_name = self
            .agents
            .snapshot()
            .await
            .into_iter()
            .find(|i| i.profile.agent_id == handle.agent_id)
            .map(|i| (i.profile.provider.clone(), i.profile.model.clone()));

        let result = async {
            let (provider_name, model) = provider_name?;
            let provider = self.llm_providers.get(&provider_name)?;
            let messages = vec![crate::domain::ports::llm::LlmMessage {
                role: "user".into(),
                content: format!(
                    "Refine the routing analysis for issue '{}': {}",
                    issue.title, issue.body
                ),
            }];
            let outcome = tokio::time::timeout(
                self.llm_timeout,
                provider.complete(&model, &messages, 512, 0.2, self.llm_timeout),
            )
            .await;
            match outcome {
                Ok(Ok(completion)) => Some(completion.text),
                _ => None,
            }
        }
        .await;

        self.agents.release(&handle).await;
        result
    }

    /// Applies the label and posts the comment, returning whether the
    /// comment succeeded. The label write and the comment write each carry
    /// their own idempotency sentinel at C2, so calling this twice for the
    /// same decision (e.g. a retry) never double-posts.
    async fn record_decision(&self, issue: &Issue, decision: &RoutingDecision) -> bool {
        let label = decision.label();
        if !issue.has_label(&label) {
            if let Err(err) = self
                .forge
                .add_label(&issue.issue_ref.repo_id, issue.issue_ref.issue_number, &label)
                .await
            {
                tracing::warn!(issue = %issue.issue_ref, error = %err, "failed to apply routing decision label");
            }
        }

        match self
            .forge
            .create_comment(
                &issue.issue_ref.repo_id,
                issue.issue_ref.issue_number,
                &decision.explanatory_text,
            )
            .await
        {
            Ok(()) => true,
            Err(err) => {
                // A rate-limited comment is tolerated: the Decision is still
                // returned and C9 retries the comment later.
                tracing::warn!(issue = %issue.issue_ref, error = %err, "failed to post routing decision comment");
                false
            }
        }
    }
}
