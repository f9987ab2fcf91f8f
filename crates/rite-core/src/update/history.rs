//! Deployment history: a capped ring buffer of update outcomes.

use rite_common::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::{write_json_pretty_atomic, RITE_DIR};

/// Maximum number of history entries retained; oldest evicted first.
pub const MAX_HISTORY_ENTRIES: usize = 100;

/// History file name inside `.rite/`.
const HISTORY_FILE: &str = "history.json";

/// Terminal status of one update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    /// Update completed and was persisted.
    Success,
    /// Update failed and no rollback restored the project.
    Failure,
    /// Update failed and the project was restored from backup.
    Rollback,
}

/// One recorded update attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentHistoryRecord {
    /// RFC-3339 timestamp of the attempt.
    pub timestamp: String,
    pub from_version: String,
    pub to_version: String,
    pub status: UpdateStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Wall-clock duration of the attempt in seconds.
    pub duration_secs: f64,
}

/// The project's persisted update history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentHistory {
    records: Vec<DeploymentHistoryRecord>,
}

impl DeploymentHistory {
    fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(RITE_DIR).join(HISTORY_FILE)
    }

    /// Load the project's history; a missing file yields an empty history.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = Self::path(project_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Persist the history under the project's `.rite/` directory.
    pub fn save(&self, project_dir: &Path) -> Result<()> {
        write_json_pretty_atomic(&Self::path(project_dir), self)
    }

    /// Append a record, evicting the oldest entry beyond the cap.
    pub fn push(&mut self, record: DeploymentHistoryRecord) {
        self.records.push(record);
        if self.records.len() > MAX_HISTORY_ENTRIES {
            let excess = self.records.len() - MAX_HISTORY_ENTRIES;
            self.records.drain(..excess);
        }
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[DeploymentHistoryRecord] {
        &self.records
    }

    /// The most recent `n` records, newest first.
    pub fn recent(&self, n: usize) -> Vec<&DeploymentHistoryRecord> {
        self.records.iter().rev().take(n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(to: &str, status: UpdateStatus) -> DeploymentHistoryRecord {
        DeploymentHistoryRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            from_version: "1.0.0".into(),
            to_version: to.into(),
            status,
            message: String::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            duration_secs: 0.1,
        }
    }

    #[test]
    fn test_push_caps_at_max() {
        let mut history = DeploymentHistory::default();
        for i in 0..(MAX_HISTORY_ENTRIES + 7) {
            history.push(record(&format!("1.0.{i}"), UpdateStatus::Success));
        }
        assert_eq!(history.records().len(), MAX_HISTORY_ENTRIES);
        // Oldest entries were evicted.
        assert_eq!(history.records()[0].to_version, "1.0.7");
    }

    #[test]
    fn test_load_save_roundtrip() {
        let temp = TempDir::new().unwrap();
        let mut history = DeploymentHistory::default();
        history.push(record("2.0.0", UpdateStatus::Rollback));
        history.save(temp.path()).unwrap();

        let loaded = DeploymentHistory::load(temp.path()).unwrap();
        assert_eq!(loaded.records().len(), 1);
        assert_eq!(loaded.records()[0].status, UpdateStatus::Rollback);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(DeploymentHistory::load(temp.path())
            .unwrap()
            .records()
            .is_empty());
    }

    #[test]
    fn test_recent_newest_first() {
        let mut history = DeploymentHistory::default();
        history.push(record("1.1.0", UpdateStatus::Success));
        history.push(record("1.2.0", UpdateStatus::Failure));

        let recent = history.recent(1);
        assert_eq!(recent[0].to_version, "1.2.0");
    }
}
