use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::issue_ref::IssueRef;

/// Default claim time-to-live: 60 minutes (`spec.md` §3).
pub const DEFAULT_CLAIM_TTL_MINUTES: i64 = 60;

/// Ownership record for an [`IssueRef`]. At most one non-expired `Claim`
/// may exist per issue across the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub issue_ref: IssueRef,
    pub claimant_agent_id: String,
    pub claimed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Claim {
    pub fn new(issue_ref: IssueRef, claimant_agent_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::with_ttl(issue_ref, claimant_agent_id, now, DEFAULT_CLAIM_TTL_MINUTES)
    }

    pub fn with_ttl(
        issue_ref: IssueRef,
        claimant_agent_id: impl Into<String>,
        now: DateTime<Utc>,
        ttl_minutes: i64,
    ) -> Self {
        Self {
            issue_ref,
            claimant_agent_id: claimant_agent_id.into(),
            claimed_at: now,
            expires_at: now + Duration::minutes(ttl_minutes),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttl_is_sixty_minutes() {
        let now = Utc::now();
        let claim = Claim::new(IssueRef::new("r", 1), "dev-1", now);
        assert_eq!((claim.expires_at - claim.claimed_at).num_minutes(), 60);
    }

    #[test]
    fn expiry_is_inclusive_at_the_boundary() {
        let now = Utc::now();
        let claim = Claim::new(IssueRef::new("r", 1), "dev-1", now);
        assert!(!claim.is_expired(now));
        assert!(claim.is_expired(claim.expires_at));
        assert!(claim.is_expired(claim.expires_at + Duration::seconds(1)));
    }
}
