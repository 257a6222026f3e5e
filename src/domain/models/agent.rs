//! Agent Profile / Agent Instance (`spec.md` §3, §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::issue_ref::IssueRef;

/// Closed set of agent roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Coordinator,
    Developer,
    Reviewer,
    Tester,
    Documenter,
    Researcher,
    Bot,
}

impl AgentRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "coordinator" => Some(Self::Coordinator),
            "developer" => Some(Self::Developer),
            "reviewer" => Some(Self::Reviewer),
            "tester" => Some(Self::Tester),
            "documenter" => Some(Self::Documenter),
            "researcher" => Some(Self::Researcher),
            "bot" => Some(Self::Bot),
            _ => None,
        }
    }
}

/// Lifecycle mode: always-on agents exist for the process lifetime;
/// on-demand agents are constructed per task, up to `concurrency_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLifecycle {
    AlwaysOn,
    OnDemand,
}

/// Declarative, immutable-after-load agent identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: String,
    pub role: AgentRole,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub capabilities: HashSet<String>,
    pub lifecycle: AgentLifecycle,
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: u32,
    pub forge_identity_ref: String,
}

const fn default_concurrency_limit() -> u32 {
    1
}

/// Live state of one running (or idle) agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Working,
    Error,
    Offline,
}

/// A live agent object, owned exclusively by the Agent Registry (C4).
#[derive(Debug, Clone)]
pub struct AgentInstance {
    pub profile: Arc<AgentProfile>,
    pub state: AgentState,
    pub current_task: Option<IssueRef>,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl AgentInstance {
    pub fn new(profile: Arc<AgentProfile>, now: DateTime<Utc>) -> Self {
        Self {
            profile,
            state: AgentState::Idle,
            current_task: None,
            started_at: now,
            last_heartbeat: now,
        }
    }

    /// Whether this instance may legally transition `state -> next`.
    ///
    /// `offline -> idle <-> working`, with `error` reachable only from
    /// `working`, recovered to `idle` by a supervisor-initiated reset, and
    /// `offline` terminal once set (`spec.md` §4.4).
    pub fn can_transition(&self, next: &AgentState) -> bool {
        use AgentState::*;
        matches!(
            (&self.state, next),
            (Idle, Working)
                | (Working, Idle)
                | (Working, Error)
                | (Error, Idle)
                | (Idle, Offline)
                | (Working, Offline)
                | (Error, Offline)
        )
    }
}
