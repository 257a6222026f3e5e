//! HTTP client for the GitHub REST API v3. Grounded on the teacher's
//! `adapters/plugins/github_issues/{client,egress,ingestion}.rs` — same
//! bearer-token request shape, same error-mapping convention — but
//! retargeted at the `ForgePort` trait instead of the teacher's
//! `EgressAdapter`/`IngestionAdapter` pair, and with retry-on-5xx handled
//! via the `backoff` crate (`spec.md` §7: `ForgeUnavailable` retried up to
//! 3 times with jittered backoff inside the forge client, never surfaced
//! past this adapter unless retries are exhausted).

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use reqwest::{Client, Method, StatusCode};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crate::domain::errors::CoreError;
use crate::domain::models::{Issue, IssueRef};
use crate::domain::ports::forge::{CreatedRef, ForgePort, RateLimitStatus};

use super::models::{
    GhAuthenticatedUser, GhCommentRequest, GhCreateRefResponse, GhIssue, GhIssueUpdateRequest,
    GhLabelCreateRequest,
};

pub struct GitHubForgeClient {
    http: Client,
    base_url: String,
    token: String,
    max_retries: u32,
    remaining: AtomicU32,
    limit: AtomicU32,
    reset_unix_secs: AtomicU64,
}

impl GitHubForgeClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, max_retries: u32) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            max_retries,
            remaining: AtomicU32::new(5_000),
            limit: AtomicU32::new(5_000),
            reset_unix_secs: AtomicU64::new(0),
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "agent-forge")
    }

    /// Issue a request, retrying on network errors and 5xx responses with
    /// jittered exponential backoff (up to `max_retries` attempts total).
    async fn send_with_retry(
        &self,
        make_request: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, CoreError> {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(200))
            .with_max_interval(Duration::from_secs(5))
            .with_max_elapsed_time(Some(Duration::from_secs(30)))
            .build();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = make_request().send().await;
            match result {
                Ok(resp) if resp.status().is_server_error() => {
                    if attempt >= self.max_retries {
                        let status = resp.status();
                        return Err(CoreError::ForgeUnavailable(format!(
                            "GitHub returned {status} after {attempt} attempts"
                        )));
                    }
                    if let Some(delay) = backoff.next_backoff() {
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(CoreError::ForgeUnavailable(format!(
                        "GitHub returned {} and backoff exhausted",
                        resp.status()
                    )));
                }
                Ok(resp) => {
                    self.update_budget_from_headers(resp.headers());
                    return Ok(resp);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(CoreError::ForgeUnavailable(format!(
                            "GitHub request failed after {attempt} attempts: {e}"
                        )));
                    }
                    if let Some(delay) = backoff.next_backoff() {
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(CoreError::ForgeUnavailable(format!(
                        "GitHub request failed and backoff exhausted: {e}"
                    )));
                }
            }
        }
    }

    fn update_budget_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        if let Some(remaining) = header_u32(headers, "x-ratelimit-remaining") {
            self.remaining.store(remaining, Ordering::Relaxed);
        }
        if let Some(limit) = header_u32(headers, "x-ratelimit-limit") {
            self.limit.store(limit, Ordering::Relaxed);
        }
        if let Some(reset) = header_u64(headers, "x-ratelimit-reset") {
            self.reset_unix_secs.store(reset, Ordering::Relaxed);
        }
    }

    async fn expect_success(resp: reqwest::Response, op: &str) -> Result<reqwest::Response, CoreError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::CONFLICT {
                Err(CoreError::Conflict(format!("{op} returned {status}: {body}")))
            } else {
                Err(CoreError::ForgeUnavailable(format!("{op} returned {status}: {body}")))
            }
        }
    }

    fn to_domain_issue(repo_id: &str, gh: GhIssue) -> Issue {
        Issue {
            issue_ref: IssueRef::new(repo_id, gh.number),
            title: gh.title,
            body: gh.body.unwrap_or_default(),
            labels: gh.labels.into_iter().map(|l| l.name).collect(),
            is_pull_request: gh.pull_request.is_some(),
            assignee_logins: gh.assignees.into_iter().map(|u| u.login).collect(),
        }
    }
}

fn header_u32(headers: &reqwest::header::HeaderMap, name: &str) -> Option<u32> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

fn header_u64(headers: &reqwest::header::HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

#[async_trait]
impl ForgePort for GitHubForgeClient {
    async fn list_issues(&self, repo_id: &str, label: &str) -> Result<Vec<Issue>, CoreError> {
        let path = format!("/repos/{repo_id}/issues?state=open&labels={label}&per_page=100");
        let resp = self.send_with_retry(|| self.request(Method::GET, &path)).await?;
        let resp = Self::expect_success(resp, "list_issues").await?;
        let issues: Vec<GhIssue> = resp
            .json()
            .await
            .map_err(|e| CoreError::ForgeUnavailable(format!("list_issues parse failed: {e}")))?;
        Ok(issues
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(|i| Self::to_domain_issue(repo_id, i))
            .collect())
    }

    async fn list_issues_by_assignee(&self, repo_id: &str, assignee: &str) -> Result<Vec<Issue>, CoreError> {
        let path = format!("/repos/{repo_id}/issues?state=open&assignee={assignee}&per_page=100");
        let resp = self.send_with_retry(|| self.request(Method::GET, &path)).await?;
        let resp = Self::expect_success(resp, "list_issues_by_assignee").await?;
        let issues: Vec<GhIssue> = resp
            .json()
            .await
            .map_err(|e| CoreError::ForgeUnavailable(format!("list_issues_by_assignee parse failed: {e}")))?;
        Ok(issues
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(|i| Self::to_domain_issue(repo_id, i))
            .collect())
    }

    async fn get_issue(&self, repo_id: &str, issue_number: u64) -> Result<Issue, CoreError> {
        let path = format!("/repos/{repo_id}/issues/{issue_number}");
        let resp = self.send_with_retry(|| self.request(Method::GET, &path)).await?;
        let resp = Self::expect_success(resp, "get_issue").await?;
        let issue: GhIssue = resp
            .json()
            .await
            .map_err(|e| CoreError::ForgeUnavailable(format!("get_issue parse failed: {e}")))?;
        Ok(Self::to_domain_issue(repo_id, issue))
    }

    async fn create_label(&self, repo_id: &str, name: &str, color: &str) -> Result<(), CoreError> {
        let path = format!("/repos/{repo_id}/labels");
        let body = GhLabelCreateRequest {
            name: name.to_string(),
            color: color.to_string(),
        };
        let resp = self
            .send_with_retry(|| self.request(Method::POST, &path).json(&body))
            .await?;
        // A 422 here means the label already exists: idempotent no-op.
        if resp.status() == StatusCode::UNPROCESSABLE_ENTITY {
            return Ok(());
        }
        Self::expect_success(resp, "create_label").await?;
        Ok(())
    }

    async fn delete_label(&self, repo_id: &str, name: &str) -> Result<(), CoreError> {
        let path = format!("/repos/{repo_id}/labels/{name}");
        let resp = self.send_with_retry(|| self.request(Method::DELETE, &path)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::expect_success(resp, "delete_label").await?;
        Ok(())
    }

    async fn add_label(&self, repo_id: &str, issue_number: u64, label: &str) -> Result<(), CoreError> {
        let path = format!("/repos/{repo_id}/issues/{issue_number}/labels");
        let body = serde_json::json!({ "labels": [label] });
        let resp = self
            .send_with_retry(|| self.request(Method::POST, &path).json(&body))
            .await?;
        Self::expect_success(resp, "add_label").await?;
        Ok(())
    }

    async fn remove_label(&self, repo_id: &str, issue_number: u64, label: &str) -> Result<(), CoreError> {
        let path = format!("/repos/{repo_id}/issues/{issue_number}/labels/{label}");
        let resp = self.send_with_retry(|| self.request(Method::DELETE, &path)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::expect_success(resp, "remove_label").await?;
        Ok(())
    }

    async fn create_comment(&self, repo_id: &str, issue_number: u64, body: &str) -> Result<(), CoreError> {
        let path = format!("/repos/{repo_id}/issues/{issue_number}/comments");
        let req = GhCommentRequest { body: body.to_string() };
        let resp = self
            .send_with_retry(|| self.request(Method::POST, &path).json(&req))
            .await?;
        Self::expect_success(resp, "create_comment").await?;
        Ok(())
    }

    async fn create_branch(&self, repo_id: &str, name: &str, from_ref: &str) -> Result<(), CoreError> {
        let ref_path = format!("/repos/{repo_id}/git/refs/heads/{from_ref}");
        let resp = self.send_with_retry(|| self.request(Method::GET, &ref_path)).await?;
        let resp = Self::expect_success(resp, "get_ref").await?;
        let sha: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CoreError::ForgeUnavailable(format!("get_ref parse failed: {e}")))?;
        let sha = sha["object"]["sha"].as_str().unwrap_or_default().to_string();

        let create_path = format!("/repos/{repo_id}/git/refs");
        let body = serde_json::json!({ "ref": format!("refs/heads/{name}"), "sha": sha });
        let resp = self
            .send_with_retry(|| self.request(Method::POST, &create_path).json(&body))
            .await?;
        Self::expect_success(resp, "create_branch").await?;
        Ok(())
    }

    async fn delete_branch(&self, repo_id: &str, name: &str) -> Result<(), CoreError> {
        let path = format!("/repos/{repo_id}/git/refs/heads/{name}");
        let resp = self.send_with_retry(|| self.request(Method::DELETE, &path)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::expect_success(resp, "delete_branch").await?;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        repo_id: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<CreatedRef, CoreError> {
        let path = format!("/repos/{repo_id}/pulls");
        let req = serde_json::json!({ "title": title, "body": body, "head": head, "base": base });
        let resp = self
            .send_with_retry(|| self.request(Method::POST, &path).json(&req))
            .await?;
        let resp = Self::expect_success(resp, "create_pull_request").await?;
        let created: GhCreateRefResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::ForgeUnavailable(format!("create_pull_request parse failed: {e}")))?;
        Ok(CreatedRef {
            number: created.number,
            url: created.html_url,
        })
    }

    async fn merge_pull_request(&self, repo_id: &str, pr_number: u64) -> Result<(), CoreError> {
        let path = format!("/repos/{repo_id}/pulls/{pr_number}/merge");
        let resp = self.send_with_retry(|| self.request(Method::PUT, &path)).await?;
        Self::expect_success(resp, "merge_pull_request").await?;
        Ok(())
    }

    async fn get_authenticated_user(&self) -> Result<String, CoreError> {
        let resp = self.send_with_retry(|| self.request(Method::GET, "/user")).await?;
        let resp = Self::expect_success(resp, "get_authenticated_user").await?;
        let user: GhAuthenticatedUser = resp
            .json()
            .await
            .map_err(|e| CoreError::ForgeUnavailable(format!("get_authenticated_user parse failed: {e}")))?;
        Ok(user.login)
    }

    async fn get_rate_limit_status(&self) -> Result<RateLimitStatus, CoreError> {
        Ok(RateLimitStatus {
            limit: self.limit.load(Ordering::Relaxed),
            remaining: self.remaining.load(Ordering::Relaxed),
            reset_unix_secs: self.reset_unix_secs.load(Ordering::Relaxed),
        })
    }
}
