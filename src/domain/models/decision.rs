//! Routing Decision value (`spec.md` §3, §4.6).

use serde::{Deserialize, Serialize};

use super::agent::AgentRole;
use super::complexity::{ComplexityAnalysis, ComplexityCategory};
use super::issue_ref::IssueRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingAction {
    StartCodeAgent,
    StartCodeAgentWithEscalation,
    StartCoordinatorOrchestration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
}

/// Produced exactly once per claim by the Coordinator Gateway (C6);
/// immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub issue_ref: IssueRef,
    pub category: ComplexityCategory,
    pub action: RoutingAction,
    pub agent_role_required: AgentRole,
    pub priority: Priority,
    pub escalation_enabled: bool,
    pub analysis: ComplexityAnalysis,
    pub explanatory_text: String,
}

impl RoutingDecision {
    /// The forge label this decision must be recorded under
    /// (`coordinator-approved-{simple|uncertain|complex}`, `spec.md` §6).
    pub fn label(&self) -> String {
        let suffix = match self.category {
            ComplexityCategory::Simple => "simple",
            ComplexityCategory::Uncertain => "uncertain",
            ComplexityCategory::Complex => "complex",
        };
        format!("coordinator-approved-{suffix}")
    }
}
