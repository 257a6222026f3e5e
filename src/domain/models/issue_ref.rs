use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique key for all per-issue state: a repository identifier paired with
/// the issue number within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueRef {
    pub repo_id: String,
    pub issue_number: u64,
}

impl IssueRef {
    pub fn new(repo_id: impl Into<String>, issue_number: u64) -> Self {
        Self {
            repo_id: repo_id.into(),
            issue_number,
        }
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo_id, self.issue_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let r = IssueRef::new("acme/widgets", 42);
        assert_eq!(r.to_string(), "acme/widgets#42");
    }

    #[test]
    fn equality_and_hash_are_by_value() {
        let a = IssueRef::new("acme/widgets", 42);
        let b = IssueRef::new("acme/widgets", 42);
        let c = IssueRef::new("acme/widgets", 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
