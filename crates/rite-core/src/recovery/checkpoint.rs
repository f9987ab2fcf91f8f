//! State-only checkpoints with integrity validation.
//!
//! A checkpoint embeds the project state at a point in time, wrapped in a
//! versioned envelope with a SHA-256 integrity digest. One JSON file per
//! checkpoint; the store auto-prunes to a configurable maximum on every
//! creation.

use chrono::Utc;
use rite_common::{CheckpointId, Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::state::{write_json_pretty_atomic, ProjectState, RITE_DIR};

/// Subdirectory of `.rite/` holding checkpoint files.
const CHECKPOINTS_SUBDIR: &str = "checkpoints";

/// Envelope schema version for forward-compat checks.
const CHECKPOINT_SCHEMA_VERSION: &str = "1";

/// Default maximum number of checkpoints retained.
pub const DEFAULT_CHECKPOINT_MAX: usize = 10;

/// A point-in-time state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    /// Human-readable label; lookup works by label or id.
    pub label: String,
    /// RFC-3339 creation time.
    pub timestamp: String,
    /// The embedded project state.
    pub state: ProjectState,
}

/// Versioned envelope wrapping a persisted checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointEnvelope {
    schema_version: String,
    /// SHA-256 hex digest of the serialized checkpoint payload.
    integrity_sha256: String,
    checkpoint: Checkpoint,
}

/// Store for state-only checkpoints of one project.
pub struct CheckpointStore {
    dir: PathBuf,
    max_checkpoints: usize,
}

impl CheckpointStore {
    /// Store rooted at the given project directory.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            dir: project_dir.join(RITE_DIR).join(CHECKPOINTS_SUBDIR),
            max_checkpoints: DEFAULT_CHECKPOINT_MAX,
        }
    }

    /// Override the retained-checkpoint maximum.
    pub fn with_max(mut self, max_checkpoints: usize) -> Self {
        self.max_checkpoints = max_checkpoints.max(1);
        self
    }

    /// Create a checkpoint embedding `state`, then prune to the maximum.
    pub fn create(&self, label: &str, state: &ProjectState) -> Result<Checkpoint> {
        fs::create_dir_all(&self.dir)?;

        let checkpoint = Checkpoint {
            id: CheckpointId::generate(),
            label: label.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            state: state.clone(),
        };
        let envelope = CheckpointEnvelope {
            schema_version: CHECKPOINT_SCHEMA_VERSION.to_string(),
            integrity_sha256: integrity_of(&checkpoint)?,
            checkpoint: checkpoint.clone(),
        };

        let path = self.dir.join(format!("{}.json", checkpoint.id));
        write_json_pretty_atomic(&path, &envelope)?;

        info!(
            target: "recovery.checkpoint_created",
            id = %checkpoint.id,
            label = %checkpoint.label,
            "Checkpoint created"
        );

        self.prune()?;
        Ok(checkpoint)
    }

    /// All checkpoints, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<Checkpoint>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            if let Ok(envelope) = read_envelope(&path) {
                checkpoints.push(envelope.checkpoint);
            }
        }

        checkpoints.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(checkpoints)
    }

    /// Load and verify a checkpoint by id.
    pub fn get(&self, id: &CheckpointId) -> Result<Checkpoint> {
        let path = self.dir.join(format!("{id}.json"));
        if !path.exists() {
            return Err(Error::CheckpointNotFound { id: id.to_string() });
        }
        let envelope = read_envelope(&path)?;

        let expected = integrity_of(&envelope.checkpoint)?;
        if envelope.integrity_sha256 != expected {
            return Err(Error::StateCorrupted(format!(
                "checkpoint {id} integrity mismatch"
            )));
        }
        Ok(envelope.checkpoint)
    }

    /// The newest checkpoint carrying the given label, if any.
    pub fn find_by_label(&self, label: &str) -> Result<Option<Checkpoint>> {
        Ok(self.list()?.into_iter().find(|c| c.label == label))
    }

    /// Resolve a checkpoint by id or, failing that, by label.
    pub fn resolve(&self, key: &str) -> Result<Checkpoint> {
        if let Some(id) = CheckpointId::parse(key) {
            if let Ok(checkpoint) = self.get(&id) {
                return Ok(checkpoint);
            }
        }
        self.find_by_label(key)?
            .ok_or_else(|| Error::CheckpointNotFound {
                id: key.to_string(),
            })
    }

    fn prune(&self) -> Result<()> {
        for stale in self.list()?.into_iter().skip(self.max_checkpoints) {
            let path = self.dir.join(format!("{}.json", stale.id));
            let _ = fs::remove_file(path);
        }
        Ok(())
    }
}

fn read_envelope(path: &Path) -> Result<CheckpointEnvelope> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn integrity_of(checkpoint: &Checkpoint) -> Result<String> {
    let payload = serde_json::to_string(checkpoint)?;
    Ok(hex::encode(Sha256::digest(payload.as_bytes())))
}
