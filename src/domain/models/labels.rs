//! The closed label set used on the forge (`spec.md` §6).

/// Input label marking an issue as actionable by the polling engine.
pub const AGENT_READY: &str = "agent-ready";

/// `agent-executing`, `escalated-to-coordinator`, `coordinator-orchestrating`:
/// progress labels applied as a pipeline advances.
pub const AGENT_EXECUTING: &str = "agent-executing";
pub const ESCALATED_TO_COORDINATOR: &str = "escalated-to-coordinator";
pub const COORDINATOR_ORCHESTRATING: &str = "coordinator-orchestrating";

/// Skip labels: an issue carrying any of these is never claimed.
pub const SKIP_LABELS: [&str; 3] = ["wontfix", "manual-only", "blocked"];

/// The claim label for a given bot identity, e.g. `claimed-by-agent-forge-bot`.
pub fn claim_label(bot_identity: &str) -> String {
    format!("claimed-by-{bot_identity}")
}
