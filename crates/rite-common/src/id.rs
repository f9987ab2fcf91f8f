//! Run and checkpoint identity types.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for one migration run.
///
/// Every `MigrationRecord` produced by a single chain execution shares the
/// same run id, so a failed chain can be correlated across records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a fresh run id.
    pub fn generate() -> Self {
        RunId(format!("run-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a state checkpoint.
///
/// Format: `ckpt-<yyyymmdd-hhmmss>-<suffix>` where the suffix disambiguates
/// checkpoints created within the same second.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(pub String);

impl CheckpointId {
    /// Generate a fresh checkpoint id.
    pub fn generate() -> Self {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        CheckpointId(format!("ckpt-{}-{}", stamp, &suffix[..8]))
    }

    /// Parse and validate a checkpoint id string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.starts_with("ckpt-") && s.len() > 5 {
            Some(CheckpointId(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
