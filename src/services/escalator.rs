//! Escalator (C7, `spec.md` §4.7). A pure threshold evaluator consulted by
//! a running agent mid-execution: no I/O, no shared state beyond the set
//! of already-escalated Pipeline Records it is told about. Grounded on the
//! teacher's `services/circuit_breaker.rs` shape — a stateless set of
//! threshold checks that returns a verdict rather than acting itself.

use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::domain::models::{EscalationContext, IssueRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Escalate(String),
    Continue,
}

pub struct Escalator {
    escalated: Mutex<HashSet<IssueRef>>,
}

impl Escalator {
    pub fn new() -> Self {
        Self {
            escalated: Mutex::new(HashSet::new()),
        }
    }

    /// Pure evaluation against the six triggers in `spec.md` §4.7. Any one
    /// being true is sufficient.
    pub fn evaluate(context: &EscalationContext) -> Verdict {
        let mut reasons = Vec::new();
        if context.files_touched > 5 {
            reasons.push(format!("files_touched={} > 5", context.files_touched));
        }
        if context.components_touched.len() > 3 {
            reasons.push(format!("components_touched={} > 3", context.components_touched.len()));
        }
        if context.failed_attempts >= 2 {
            reasons.push(format!("failed_attempts={} >= 2", context.failed_attempts));
        }
        if context.elapsed_minutes > 30.0 {
            reasons.push(format!("elapsed_minutes={} > 30", context.elapsed_minutes));
        }
        if context.architecture_changes {
            reasons.push("architecture_changes".to_string());
        }
        if context.coordination_requested {
            reasons.push("coordination_requested".to_string());
        }

        if reasons.is_empty() {
            Verdict::Continue
        } else {
            Verdict::Escalate(reasons.join("; "))
        }
    }

    /// `evaluate` plus the idempotence guarantee: an already-escalated
    /// Pipeline Record ignores further escalation requests (`spec.md`
    /// §4.7, §8).
    pub async fn evaluate_once(&self, issue_ref: &IssueRef, context: &EscalationContext) -> Verdict {
        let mut escalated = self.escalated.lock().await;
        if escalated.contains(issue_ref) {
            return Verdict::Continue;
        }

        let verdict = Self::evaluate(context);
        if matches!(verdict, Verdict::Escalate(_)) {
            escalated.insert(issue_ref.clone());
        }
        verdict
    }

    pub async fn has_escalated(&self, issue_ref: &IssueRef) -> bool {
        self.escalated.lock().await.contains(issue_ref)
    }
}

impl Default for Escalator {
    fn default() -> Self {
        Self::new()
    }
}
