//! Pipeline-state persistence (`spec.md` §6): a map from Issue Reference to
//! Pipeline Record, loaded at boot and written on every transition via
//! write-to-temp-then-rename (atomic replace).

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::models::{IssueRef, PipelineRecord};

pub struct PipelineStore {
    path: PathBuf,
}

impl PipelineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted map, or an empty map if the file doesn't exist
    /// yet (first boot).
    pub fn load(&self) -> io::Result<HashMap<IssueRef, PipelineRecord>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        let entries: Vec<PipelineRecord> = serde_json::from_str(&contents)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(entries.into_iter().map(|r| (r.issue_ref.clone(), r)).collect())
    }

    /// Persist the full map via write-to-temp-then-rename so a crash mid
    /// write never corrupts the on-disk state.
    pub fn save(&self, records: &HashMap<IssueRef, PipelineRecord>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let values: Vec<&PipelineRecord> = records.values().collect();
        let serialized = serde_json::to_string_pretty(&values)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let tmp_path = tmp_path_for(&self.path);
        fs::write(&tmp_path, serialized)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = PipelineStore::new(dir.path().join("pipelines.json"));

        let mut records = HashMap::new();
        let issue_ref = IssueRef::new("acme/widgets", 1);
        records.insert(issue_ref.clone(), PipelineRecord::new(issue_ref, Utc::now()));

        store.save(&records).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&IssueRef::new("acme/widgets", 1)));
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PipelineStore::new(dir.path().join("nonexistent.json"));
        assert!(store.load().unwrap().is_empty());
    }
}
