//! Closed error taxonomy for the orchestration core (`spec.md` §7).
//!
//! Every outcome that crosses a component boundary is one of these eight
//! kinds. Propagation policy (recovered locally vs. surfaced to the
//! pipeline orchestrator vs. surfaced to the user) lives with the callers
//! in `services::pipeline_orchestrator`, not here — this module only
//! names the taxonomy.

use thiserror::Error;

use crate::domain::models::issue_ref::IssueRef;

/// The closed error taxonomy shared by every component.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    /// A rate-limit check denied the action. Transient; the caller may
    /// retry after `retry_after`, if present.
    #[error("rate limited: {reason}")]
    RateLimited {
        reason: String,
        retry_after_secs: Option<u64>,
    },

    /// The code forge was unreachable or returned a 5xx after retries
    /// were exhausted inside the forge client.
    #[error("forge unavailable: {0}")]
    ForgeUnavailable(String),

    /// An LLM provider was down, rejected the request, or timed out.
    #[error("llm unavailable ({kind:?}): {message}")]
    LlmUnavailable { kind: LlmErrorKind, message: String },

    /// Lost a claim race, or a label/comment was already present.
    /// Always handled locally; never surfaced past the component that
    /// detected it.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Issue content failed validation (forbidden operation requested,
    /// malformed instructions, etc). Terminal: pipeline abandons with an
    /// explanatory comment.
    #[error("invalid instruction: {0}")]
    InvalidInstruction(String),

    /// An agent reported an internal failure. Counted against the
    /// pipeline's retry budget.
    #[error("agent error: {0}")]
    AgentError(String),

    /// Cancelled by the supervisor, a timeout, or an explicit user
    /// action. Never retried.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Programmer error or invariant violation. Logged and the offending
    /// task is shut down; the process continues.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CoreError {
    /// Whether the pipeline orchestrator should count this against
    /// `max_attempts` and retry with backoff.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LlmUnavailable { .. } | Self::AgentError(_))
    }

    /// Whether this error should produce a final, user-visible comment on
    /// the issue when the owning pipeline terminates.
    pub const fn is_user_visible(&self) -> bool {
        matches!(self, Self::InvalidInstruction(_))
    }

    /// Whether this error is recovered entirely within the component that
    /// produced it and must never propagate to the pipeline orchestrator.
    pub const fn is_locally_recovered(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Conflict(_))
    }
}

/// Sub-kinds of [`CoreError::LlmUnavailable`], mirroring the LLM provider
/// contract in `spec.md` §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    RateLimited,
    Unavailable,
    InvalidRequest,
    Timeout,
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Errors specific to the rate limiter (C1). Kept separate from
/// [`CoreError`] because `check`/`record` results are a normal control-flow
/// value, not an exceptional outcome — only the forge client translates a
/// [`Denial`] into [`CoreError::RateLimited`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLimiterError {
    #[error("event log is empty, nothing to record against")]
    EmptyLog,
}

/// Errors from the claim protocol (C10), handled locally per `spec.md` §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("issue {0:?} already has a non-expired local claim")]
    AlreadyClaimed(IssueRef),

    #[error("lost the claim race for {0:?}: competing claim has an earlier timestamp")]
    LostRace(IssueRef),
}

/// Errors surfaced while loading configuration, agent profiles, or
/// credentials at boot. These are fatal at startup (no dynamic tolerance
/// of unknown `role`/`provider` values, per `spec.md` §9).
#[derive(Debug, Error)]
pub enum BootError {
    #[error("config error: {0}")]
    Config(String),

    #[error("unknown agent role '{0}' in profile '{1}'")]
    UnknownRole(String, String),

    #[error("unknown provider '{0}' in profile '{1}'")]
    UnknownProvider(String, String),

    #[error("profile directory read failed: {0}")]
    ProfileDirIo(String),

    #[error("secret store read failed for identity '{0}': {1}")]
    SecretIo(String, String),

    #[error("secret file for identity '{0}' has insecure permissions: {1}")]
    InsecurePermissions(String, String),
}
