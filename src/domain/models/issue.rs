use serde::{Deserialize, Serialize};

use super::issue_ref::IssueRef;

/// Fetched issue content — the input to the Complexity Analyzer (C5) and
/// the Coordinator Gateway (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub issue_ref: IssueRef,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub is_pull_request: bool,
    pub assignee_logins: Vec<String>,
}

impl Issue {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}
