//! Rate-Limit Event and the closed Operation Kind set (`spec.md` §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of outbound operation kinds the Rate Limiter (C1) guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    IssueComment,
    IssueCreate,
    IssueUpdate,
    PrCreate,
    PrComment,
    PrUpdate,
    PrMerge,
    BranchCreate,
    ApiRead,
}

impl OpKind {
    pub const ALL: [OpKind; 9] = [
        OpKind::IssueComment,
        OpKind::IssueCreate,
        OpKind::IssueUpdate,
        OpKind::PrCreate,
        OpKind::PrComment,
        OpKind::PrUpdate,
        OpKind::PrMerge,
        OpKind::BranchCreate,
        OpKind::ApiRead,
    ];

    /// Reads are exempt from the write-oriented cooldown/burst/duplicate
    /// checks (`spec.md` §4.2: "read calls update the API-budget view but
    /// don't consult rate limits beyond the safety threshold").
    pub const fn is_write(self) -> bool {
        !matches!(self, Self::ApiRead)
    }
}

/// Append-only log entry; queried by C1 to compute windowed counts and
/// detect duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitEvent {
    pub timestamp: DateTime<Utc>,
    pub op_kind: OpKind,
    pub target: String,
    pub content_digest: String,
    pub success: bool,
}
