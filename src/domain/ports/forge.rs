//! Code-forge contract (`spec.md` §6).
//!
//! Abstracted over any concrete provider; the only concrete implementation
//! shipped here is `infrastructure::forge::github::GitHubForgeClient`.

use async_trait::async_trait;

use crate::domain::errors::CoreResult;
use crate::domain::models::Issue;

/// Snapshot of the forge's own rate-limit headers, used by C1 to track the
/// "remaining budget" safety threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_unix_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CreatedRef {
    pub number: u64,
    pub url: String,
}

/// The set of code-forge operations the orchestration core consumes.
/// Every mutating method is expected to be called only after the caller
/// (`services::forge_client::ForgeClient`) has obtained `Allow` from C1.
#[async_trait]
pub trait ForgePort: Send + Sync {
    async fn list_issues(&self, repo_id: &str, label: &str) -> CoreResult<Vec<Issue>>;
    /// Open issues assigned to `assignee`, independent of labels — the
    /// second discovery path alongside label-based `list_issues`
    /// (`spec.md` §4.10 criterion (a): "labelled 'agent-ready' OR assigned
    /// to a known bot identity").
    async fn list_issues_by_assignee(&self, repo_id: &str, assignee: &str) -> CoreResult<Vec<Issue>>;
    async fn get_issue(&self, repo_id: &str, issue_number: u64) -> CoreResult<Issue>;

    async fn create_label(&self, repo_id: &str, name: &str, color: &str) -> CoreResult<()>;
    async fn delete_label(&self, repo_id: &str, name: &str) -> CoreResult<()>;
    async fn add_label(&self, repo_id: &str, issue_number: u64, label: &str) -> CoreResult<()>;
    async fn remove_label(&self, repo_id: &str, issue_number: u64, label: &str) -> CoreResult<()>;

    async fn create_comment(&self, repo_id: &str, issue_number: u64, body: &str) -> CoreResult<()>;

    async fn create_branch(&self, repo_id: &str, name: &str, from_ref: &str) -> CoreResult<()>;
    async fn delete_branch(&self, repo_id: &str, name: &str) -> CoreResult<()>;

    async fn create_pull_request(
        &self,
        repo_id: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> CoreResult<CreatedRef>;

    async fn merge_pull_request(&self, repo_id: &str, pr_number: u64) -> CoreResult<()>;

    async fn get_authenticated_user(&self) -> CoreResult<String>;

    /// Parsed from the response headers of the most recent request; used
    /// by C1's forge-budget safety check.
    async fn get_rate_limit_status(&self) -> CoreResult<RateLimitStatus>;
}
