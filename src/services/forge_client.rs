//! Forge Client (C2, `spec.md` §4.2). Wraps any `ForgePort` adapter with a
//! mandatory Rate Limiter (C1) admission check on every call and records
//! the outcome afterwards; the forge's own rate-limit headers feed back
//! into C1's safety-threshold view. No component is permitted to hold a
//! `ForgePort` directly — everything goes through here.

use std::sync::Arc;

use crate::domain::errors::CoreError;
use crate::domain::models::{Issue, OpKind};
use crate::domain::ports::forge::CreatedRef;
use crate::domain::ports::ForgePort;

use super::rate_limiter::{Decision, RateLimiter};

pub struct ForgeClient {
    inner: Arc<dyn ForgePort>,
    rate_limiter: Arc<RateLimiter>,
}

impl ForgeClient {
    pub fn new(inner: Arc<dyn ForgePort>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self { inner, rate_limiter }
    }

    async fn gate<T, F>(&self, op_kind: OpKind, target: &str, content: &str, call: F) -> Result<T, CoreError>
    where
        F: std::future::Future<Output = Result<T, CoreError>>,
    {
        match self.rate_limiter.check(op_kind, target, content).await {
            Decision::Allow => {}
            Decision::Deny {
                reason,
                retry_after_secs,
            } => {
                return Err(CoreError::RateLimited {
                    reason,
                    retry_after_secs,
                })
            }
        }

        let result = call.await;
        self.rate_limiter
            .record(op_kind, target, content, result.is_ok())
            .await;

        if let Ok(status) = self.inner.get_rate_limit_status().await {
            self.rate_limiter.update_forge_budget(status.remaining, status.limit);
        }

        result
    }

    pub async fn list_issues(&self, repo_id: &str, label: &str) -> Result<Vec<Issue>, CoreError> {
        self.gate(OpKind::ApiRead, repo_id, label, self.inner.list_issues(repo_id, label))
            .await
    }

    pub async fn list_issues_by_assignee(&self, repo_id: &str, assignee: &str) -> Result<Vec<Issue>, CoreError> {
        self.gate(
            OpKind::ApiRead,
            repo_id,
            assignee,
            self.inner.list_issues_by_assignee(repo_id, assignee),
        )
        .await
    }

    pub async fn get_issue(&self, repo_id: &str, issue_number: u64) -> Result<Issue, CoreError> {
        let target = format!("{repo_id}#{issue_number}");
        self.gate(OpKind::ApiRead, &target, "", self.inner.get_issue(repo_id, issue_number))
            .await
    }

    pub async fn create_label(&self, repo_id: &str, name: &str, color: &str) -> Result<(), CoreError> {
        self.gate(
            OpKind::IssueUpdate,
            repo_id,
            name,
            self.inner.create_label(repo_id, name, color),
        )
        .await
    }

    pub async fn delete_label(&self, repo_id: &str, name: &str) -> Result<(), CoreError> {
        self.gate(OpKind::IssueUpdate, repo_id, name, self.inner.delete_label(repo_id, name))
            .await
    }

    /// Idempotent at this layer per `spec.md` §4.2: a digest sentinel in
    /// the event log is consulted before issuing the write, independent of
    /// whatever label-presence check (if any) the caller already did. The
    /// forge's own label-set semantics make a redundant add a no-op too,
    /// but the sentinel means a retry after a crash never costs a second
    /// rate-limited call.
    pub async fn add_label(&self, repo_id: &str, issue_number: u64, label: &str) -> Result<(), CoreError> {
        let target = format!("{repo_id}#{issue_number}");
        if self.rate_limiter.already_succeeded(OpKind::IssueUpdate, &target, label).await {
            return Ok(());
        }
        self.gate(
            OpKind::IssueUpdate,
            &target,
            label,
            self.inner.add_label(repo_id, issue_number, label),
        )
        .await
    }

    pub async fn remove_label(&self, repo_id: &str, issue_number: u64, label: &str) -> Result<(), CoreError> {
        let target = format!("{repo_id}#{issue_number}");
        self.gate(
            OpKind::IssueUpdate,
            &target,
            label,
            self.inner.remove_label(repo_id, issue_number, label),
        )
        .await
    }

    /// Idempotent at this layer per `spec.md` §4.2: a trailing sentinel in
    /// the comment body's content digest is checked against the event log
    /// before issuing the write, so a caller that lost track of whether it
    /// already posted this exact comment (e.g. after a crash, or because
    /// its own label-presence gate isn't a reliable proxy for "comment
    /// already sent") can call this unconditionally and get a safe no-op.
    pub async fn create_comment(&self, repo_id: &str, issue_number: u64, body: &str) -> Result<(), CoreError> {
        let target = format!("{repo_id}#{issue_number}");
        if self.rate_limiter.already_succeeded(OpKind::IssueComment, &target, body).await {
            return Ok(());
        }
        self.gate(
            OpKind::IssueComment,
            &target,
            body,
            self.inner.create_comment(repo_id, issue_number, body),
        )
        .await
    }

    pub async fn create_branch(&self, repo_id: &str, name: &str, from_ref: &str) -> Result<(), CoreError> {
        self.gate(
            OpKind::BranchCreate,
            repo_id,
            name,
            self.inner.create_branch(repo_id, name, from_ref),
        )
        .await
    }

    pub async fn delete_branch(&self, repo_id: &str, name: &str) -> Result<(), CoreError> {
        self.gate(OpKind::BranchCreate, repo_id, name, self.inner.delete_branch(repo_id, name))
            .await
    }

    pub async fn create_pull_request(
        &self,
        repo_id: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<CreatedRef, CoreError> {
        self.gate(
            OpKind::PrCreate,
            repo_id,
            &format!("{title}\n{head}->{base}"),
            self.inner.create_pull_request(repo_id, title, body, head, base),
        )
        .await
    }

    pub async fn merge_pull_request(&self, repo_id: &str, pr_number: u64) -> Result<(), CoreError> {
        let target = format!("{repo_id}#{pr_number}");
        self.gate(OpKind::PrMerge, &target, "", self.inner.merge_pull_request(repo_id, pr_number))
            .await
    }

    pub async fn get_authenticated_user(&self) -> Result<String, CoreError> {
        self.gate(OpKind::ApiRead, "self", "", self.inner.get_authenticated_user())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::RateLimitConfig;
    use crate::domain::ports::clock::SystemClock;
    use crate::domain::ports::forge::RateLimitStatus;
    use crate::infrastructure::persistence::RateLogMirror;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingForge {
        comments: AtomicUsize,
    }

    #[async_trait]
    impl ForgePort for CountingForge {
        async fn list_issues(&self, _repo_id: &str, _label: &str) -> Result<Vec<Issue>, CoreError> {
            Ok(Vec::new())
        }
        async fn list_issues_by_assignee(&self, _repo_id: &str, _assignee: &str) -> Result<Vec<Issue>, CoreError> {
            Ok(Vec::new())
        }
        async fn get_issue(&self, repo_id: &str, issue_number: u64) -> Result<Issue, CoreError> {
            Ok(Issue {
                issue_ref: crate::domain::models::IssueRef::new(repo_id, issue_number),
                title: String::new(),
                body: String::new(),
                labels: Vec::new(),
                is_pull_request: false,
                assignee_logins: Vec::new(),
            })
        }
        async fn create_label(&self, _repo_id: &str, _name: &str, _color: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn delete_label(&self, _repo_id: &str, _name: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn add_label(&self, _repo_id: &str, _issue_number: u64, _label: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn remove_label(&self, _repo_id: &str, _issue_number: u64, _label: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn create_comment(&self, _repo_id: &str, _issue_number: u64, _body: &str) -> Result<(), CoreError> {
            self.comments.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn create_branch(&self, _repo_id: &str, _name: &str, _from_ref: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn delete_branch(&self, _repo_id: &str, _name: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn create_pull_request(
            &self,
            _repo_id: &str,
            _title: &str,
            _body: &str,
            _head: &str,
            _base: &str,
        ) -> Result<CreatedRef, CoreError> {
            Ok(CreatedRef { number: 1, url: "https://example.com/1".into() })
        }
        async fn merge_pull_request(&self, _repo_id: &str, _pr_number: u64) -> Result<(), CoreError> {
            Ok(())
        }
        async fn get_authenticated_user(&self) -> Result<String, CoreError> {
            Ok("agent-forge-bot".into())
        }
        async fn get_rate_limit_status(&self) -> Result<RateLimitStatus, CoreError> {
            Ok(RateLimitStatus { limit: 5000, remaining: 4999, reset_unix_secs: 0 })
        }
    }

    fn client() -> (ForgeClient, Arc<CountingForge>) {
        let forge = Arc::new(CountingForge { comments: AtomicUsize::new(0) });
        let limiter = Arc::new(RateLimiter::new(
            RateLimitConfig::default(),
            Arc::new(SystemClock),
            RateLogMirror::disabled(),
        ));
        (ForgeClient::new(forge.clone(), limiter), forge)
    }

    #[tokio::test]
    async fn successful_comment_is_recorded_against_rate_limiter() {
        let (client, forge) = client();
        client.create_comment("acme/widgets", 1, "hello").await.unwrap();
        assert_eq!(forge.comments.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn denied_write_never_reaches_the_forge() {
        let (client, forge) = client();
        client.rate_limiter.update_forge_budget(0, 5000);
        let result = client.create_comment("acme/widgets", 1, "hello").await;
        assert!(matches!(result, Err(CoreError::RateLimited { .. })));
        assert_eq!(forge.comments.load(Ordering::SeqCst), 0);
    }
}
