//! Pipeline Record and its state machine (`spec.md` §3, §4.9).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::RoutingDecision;
use super::issue_ref::IssueRef;

/// Default maximum retry attempts before a pipeline abandons.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Claimed,
    Analyzed,
    Dispatched,
    Executing,
    Reviewing,
    Merged,
    Failed,
    Abandoned,
}

impl PipelinePhase {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Merged | Self::Abandoned)
    }

    /// Whether `self -> next` is a legal transition per the state diagram
    /// in `spec.md` §4.9. `Failed` is retryable back into `Dispatched`
    /// (a fresh dispatch attempt) until attempts are exhausted, at which
    /// point the caller drives `Failed -> Abandoned` explicitly.
    pub const fn can_transition(self, next: Self) -> bool {
        use PipelinePhase::*;
        matches!(
            (self, next),
            (Claimed, Analyzed)
                | (Analyzed, Dispatched)
                | (Dispatched, Executing)
                | (Executing, Reviewing)
                | (Reviewing, Merged)
                | (Executing, Failed)
                | (Dispatched, Failed)
                | (Failed, Dispatched)
                | (Failed, Abandoned)
                | (Claimed, Abandoned)
                | (Analyzed, Abandoned)
                | (Dispatched, Abandoned)
                | (Executing, Abandoned)
                | (Reviewing, Abandoned)
        )
    }
}

/// One per claimed issue; drives crash recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub issue_ref: IssueRef,
    pub phase: PipelinePhase,
    pub decision: Option<RoutingDecision>,
    /// Whether C6's explanatory comment for `decision` is confirmed posted.
    /// `false` means either no decision yet, or the comment write failed
    /// (e.g. rate-limited) and is owed a retry — the label may already be
    /// applied independently (`spec.md` §4.6, §9).
    #[serde(default)]
    pub decision_comment_posted: bool,
    pub agent_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
    pub attempts: u32,
}

impl PipelineRecord {
    pub fn new(issue_ref: IssueRef, now: DateTime<Utc>) -> Self {
        Self {
            issue_ref,
            phase: PipelinePhase::Claimed,
            decision: None,
            decision_comment_posted: false,
            agent_id: None,
            started_at: now,
            updated_at: now,
            error: None,
            attempts: 0,
        }
    }

    /// Attempt to move to `next`, returning `false` (no mutation) if the
    /// transition is illegal.
    #[must_use]
    pub fn transition(&mut self, next: PipelinePhase, now: DateTime<Utc>) -> bool {
        if !self.phase.can_transition(next) {
            return false;
        }
        self.phase = next;
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_totally_ordered() {
        let mut r = PipelineRecord::new(IssueRef::new("r", 1), Utc::now());
        for next in [
            PipelinePhase::Analyzed,
            PipelinePhase::Dispatched,
            PipelinePhase::Executing,
            PipelinePhase::Reviewing,
            PipelinePhase::Merged,
        ] {
            assert!(r.transition(next, Utc::now()), "failed to reach {next:?}");
        }
        assert!(r.phase.is_terminal());
    }

    #[test]
    fn cannot_skip_phases() {
        let mut r = PipelineRecord::new(IssueRef::new("r", 1), Utc::now());
        assert!(!r.transition(PipelinePhase::Executing, Utc::now()));
        assert_eq!(r.phase, PipelinePhase::Claimed);
    }

    #[test]
    fn failed_can_retry_into_dispatched_or_abandon() {
        let mut r = PipelineRecord::new(IssueRef::new("r", 1), Utc::now());
        r.transition(PipelinePhase::Analyzed, Utc::now());
        r.transition(PipelinePhase::Dispatched, Utc::now());
        r.transition(PipelinePhase::Executing, Utc::now());
        assert!(r.transition(PipelinePhase::Failed, Utc::now()));
        assert!(r.transition(PipelinePhase::Dispatched, Utc::now()));

        let mut r2 = PipelineRecord::new(IssueRef::new("r", 2), Utc::now());
        r2.phase = PipelinePhase::Failed;
        assert!(r2.transition(PipelinePhase::Abandoned, Utc::now()));
        assert!(r2.phase.is_terminal());
    }

    #[test]
    fn any_non_terminal_phase_can_abandon() {
        for phase in [
            PipelinePhase::Claimed,
            PipelinePhase::Analyzed,
            PipelinePhase::Dispatched,
            PipelinePhase::Executing,
            PipelinePhase::Reviewing,
        ] {
            assert!(phase.can_transition(PipelinePhase::Abandoned), "{phase:?} should abandon");
        }
    }
}
