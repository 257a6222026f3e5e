//! Workspace Manager (C13, `spec.md` §4.13). Scoped acquisition of a
//! per-task directory: a `WorkspaceHandle`'s `Drop` guarantees release on
//! every exit path (success, error, panic-unwind), mirroring the
//! acquire-then-always-release pattern the teacher uses for its on-disk
//! scratch state. Callers that know they're finishing normally should
//! still prefer the explicit async `destroy()` so cleanup errors are
//! observable instead of silently swallowed in `Drop`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use uuid::Uuid;

use crate::domain::models::{IssueRef, Workspace};

const MARKER_FILE: &str = "workspace.json";

pub struct WorkspaceManager {
    root: PathBuf,
}

pub struct WorkspaceHandle {
    workspace: Workspace,
    released: AtomicBool,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn acquire(&self, issue_ref: IssueRef) -> std::io::Result<WorkspaceHandle> {
        let workspace_id = Uuid::new_v4();
        let root_path = self.root.join(workspace_id.to_string());
        tokio::fs::create_dir_all(&root_path).await?;

        let workspace = Workspace {
            workspace_id,
            issue_ref,
            root_path: root_path.clone(),
            created_at: Utc::now(),
        };

        let marker = serde_json::to_string_pretty(&workspace)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(root_path.join(MARKER_FILE), marker).await?;

        Ok(WorkspaceHandle {
            workspace,
            released: AtomicBool::new(false),
        })
    }

    /// Boot-time sweep: any on-disk workspace whose owning Pipeline Record
    /// is terminal or absent is removed. `is_live` decides liveness per
    /// issue reference.
    pub async fn garbage_collect(
        &self,
        is_live: impl Fn(&IssueRef) -> bool,
    ) -> std::io::Result<Vec<Uuid>> {
        let mut removed = Vec::new();
        if !self.root.exists() {
            return Ok(removed);
        }

        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let marker_path = path.join(MARKER_FILE);
            let Ok(contents) = tokio::fs::read_to_string(&marker_path).await else {
                continue;
            };
            let Ok(workspace) = serde_json::from_str::<Workspace>(&contents) else {
                continue;
            };
            if !is_live(&workspace.issue_ref) {
                tokio::fs::remove_dir_all(&path).await?;
                removed.push(workspace.workspace_id);
            }
        }
        Ok(removed)
    }
}

impl WorkspaceHandle {
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Explicit async release. Prefer this over relying on `Drop` when the
    /// caller can observe the result.
    pub async fn destroy(self) -> std::io::Result<()> {
        self.released.store(true, Ordering::SeqCst);
        tokio::fs::remove_dir_all(&self.workspace.root_path).await
    }
}

impl Drop for WorkspaceHandle {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = std::fs::remove_dir_all(&self.workspace.root_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.workspace.root_path.display(), error = %err, "workspace cleanup on drop failed");
            }
        }
    }
}
