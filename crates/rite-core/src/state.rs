//! Project state: the durable record of what rite last did to a project.
//!
//! The engine reads `applied_migrations` to filter already-applied entries
//! and writes the new version and migration list back after a successful
//! update. The CLI persists state as JSON under the project's `.rite/`
//! directory; other frontends can supply their own [`StateStore`].

use chrono::Utc;
use rite_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory under the project root holding all rite-owned artifacts.
pub const RITE_DIR: &str = ".rite";

/// State file name inside [`RITE_DIR`].
pub const STATE_FILE: &str = "state.json";

/// One migration that has been applied to the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
    /// Target version of the migration (its `to_version`).
    pub version: String,
    /// RFC-3339 timestamp of application.
    pub applied_at: String,
}

impl AppliedMigration {
    pub fn now(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            applied_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Durable per-project state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectState {
    /// Name of the ritual the project was scaffolded from.
    pub ritual_name: String,

    /// Ritual version currently deployed.
    pub ritual_version: String,

    /// Migrations applied so far, in application order.
    #[serde(default)]
    pub applied_migrations: Vec<AppliedMigration>,

    /// Files the ritual generated (relative to the project root).
    #[serde(default)]
    pub generated_files: Vec<String>,

    /// Protected patterns recorded at scaffold time.
    #[serde(default)]
    pub protected_files: Vec<String>,
}

impl ProjectState {
    /// Versions of all applied migrations, in application order.
    pub fn applied_versions(&self) -> Vec<String> {
        self.applied_migrations
            .iter()
            .map(|m| m.version.clone())
            .collect()
    }

    /// True when the migration targeting `version` has already been applied.
    pub fn has_applied(&self, version: &str) -> bool {
        self.applied_migrations.iter().any(|m| m.version == version)
    }
}

/// Persistence seam for project state.
pub trait StateStore {
    fn load(&self) -> Result<ProjectState>;
    fn save(&self, state: &ProjectState) -> Result<()>;
}

/// JSON-file state store at `<project>/.rite/state.json`.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Store for the given project root.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            path: project_dir.join(RITE_DIR).join(STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<ProjectState> {
        if !self.path.exists() {
            return Err(Error::StateNotFound {
                path: self.path.clone(),
            });
        }
        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::StateCorrupted(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, state: &ProjectState) -> Result<()> {
        write_json_pretty_atomic(&self.path, state)
    }
}

/// Write a serializable value as pretty JSON via a temp file and rename,
/// so readers never observe a half-written file.
pub(crate) fn write_json_pretty_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
