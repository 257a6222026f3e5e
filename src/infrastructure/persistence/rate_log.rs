//! Optional JSON-lines mirror of the Rate-Limit Event ring buffer, for
//! post-mortem inspection (`spec.md` §6). The in-memory ring buffer inside
//! the Rate Limiter (C1) is authoritative for runtime decisions; this is a
//! best-effort append-only sink, never read back by the core.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::models::RateLimitEvent;

pub struct RateLogMirror {
    path: PathBuf,
    file: Mutex<Option<std::fs::File>>,
}

impl RateLogMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    /// Disabled mirror: `append` becomes a no-op. Used when
    /// `persistence.rate_log_path` is unset in config.
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            file: Mutex::new(None),
        }
    }

    fn open(&self) -> io::Result<std::fs::File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&self.path)
    }

    /// Append one event as a JSON line. Failures are logged by the caller,
    /// never fatal — this mirror is diagnostic, not authoritative.
    pub fn append(&self, event: &RateLimitEvent) -> io::Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        let mut guard = self.file.lock().expect("rate log mirror lock poisoned");
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        let file = guard.as_mut().expect("just populated above");
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        file.write_all(line.as_bytes())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::OpKind;
    use chrono::Utc;
    use std::io::BufRead;

    fn event() -> RateLimitEvent {
        RateLimitEvent {
            timestamp: Utc::now(),
            op_kind: OpKind::IssueComment,
            target: "acme/widgets#1".into(),
            content_digest: "deadbeef".into(),
            success: true,
        }
    }

    #[test]
    fn appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = RateLogMirror::new(dir.path().join("rate_log.jsonl"));
        mirror.append(&event()).unwrap();
        mirror.append(&event()).unwrap();

        let contents = std::fs::read(mirror.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn disabled_mirror_is_a_noop() {
        let mirror = RateLogMirror::disabled();
        mirror.append(&event()).unwrap();
    }
}
