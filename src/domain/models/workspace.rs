use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::issue_ref::IssueRef;

/// Per-task scratch directory, exclusively owned by the agent that
/// requested it (`spec.md` §3, §4.13).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub workspace_id: Uuid,
    pub issue_ref: IssueRef,
    pub root_path: PathBuf,
    pub created_at: DateTime<Utc>,
}
