//! GitHub REST API v3 wire models. Grounded on the teacher's
//! `adapters/plugins/github_issues/models.rs`; not part of the public
//! domain model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<GhLabel>,
    #[serde(default)]
    pub pull_request: Option<GhPullRequestRef>,
    #[serde(default)]
    pub assignees: Vec<GhUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhLabel {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhPullRequestRef {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhUser {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhCommentRequest {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhLabelCreateRequest {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhIssueUpdateRequest {
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhCreateRefResponse {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhAuthenticatedUser {
    pub login: String,
}
