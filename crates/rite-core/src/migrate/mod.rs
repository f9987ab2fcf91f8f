//! Migration execution with per-migration outcome records.
//!
//! Migrations run strictly in input order and the chain stops at the first
//! failure. The runner never rolls back on its own; restoring from backup is
//! the orchestrator's responsibility.

use chrono::Utc;
use rite_common::{Error, Result, RunId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Migration definitions
// ---------------------------------------------------------------------------

/// A migration handler: exactly one executable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationHandler {
    /// A list of SQL statements. Validated here; execution against a live
    /// connection is an external collaborator's concern.
    Sql { statements: Vec<String> },
    /// A script path, resolved relative to the project root.
    Script { path: String },
    /// An opaque code reference for an embedding application to dispatch.
    Code { reference: String },
}

impl MigrationHandler {
    /// True when the handler has something to execute.
    pub fn has_content(&self) -> bool {
        match self {
            MigrationHandler::Sql { statements } => !statements.is_empty(),
            MigrationHandler::Script { path } => !path.trim().is_empty(),
            MigrationHandler::Code { reference } => !reference.trim().is_empty(),
        }
    }
}

/// A declared transformation from one ritual version to the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationDefinition {
    pub from_version: String,
    pub to_version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up: Option<MigrationHandler>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down: Option<MigrationHandler>,
    #[serde(default)]
    pub idempotent: bool,
}

impl MigrationDefinition {
    pub fn new(from_version: impl Into<String>, to_version: impl Into<String>) -> Self {
        Self {
            from_version: from_version.into(),
            to_version: to_version.into(),
            description: String::new(),
            up: None,
            down: None,
            idempotent: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_up(mut self, handler: MigrationHandler) -> Self {
        self.up = Some(handler);
        self
    }

    pub fn with_down(mut self, handler: MigrationHandler) -> Self {
        self.down = Some(handler);
        self
    }

    pub fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }
}

/// Structural validation of a single migration.
///
/// Rejects a migration with no up handler content and, unless marked
/// idempotent, one with no down handler content. Performed before any
/// execution; it never runs anything.
pub fn validate(migration: &MigrationDefinition) -> Result<()> {
    let up_ok = migration.up.as_ref().map(|h| h.has_content()).unwrap_or(false);
    if !up_ok {
        return Err(Error::MissingUpHandler {
            from_version: migration.from_version.clone(),
            to_version: migration.to_version.clone(),
        });
    }

    if !migration.idempotent {
        let down_ok = migration
            .down
            .as_ref()
            .map(|h| h.has_content())
            .unwrap_or(false);
        if !down_ok {
            return Err(Error::MissingDownHandler {
                from_version: migration.from_version.clone(),
                to_version: migration.to_version.clone(),
            });
        }
    }

    Ok(())
}

/// Validate every migration in a chain.
///
/// Also warns when the declared order disagrees with semantic-version order
/// of the targets; the declared order still wins at execution time.
pub fn validate_chain(migrations: &[MigrationDefinition]) -> Result<()> {
    for migration in migrations {
        validate(migration)?;
    }

    let targets: Vec<semver::Version> = migrations
        .iter()
        .filter_map(|m| semver::Version::parse(&m.to_version).ok())
        .collect();
    if targets.len() == migrations.len() && !targets.windows(2).all(|w| w[0] <= w[1]) {
        warn!(
            target: "migrate.order_warning",
            "migration chain is not in semantic-version order; declared order will be used"
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Run records
// ---------------------------------------------------------------------------

/// Per-migration outcome state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Pending,
    Applied,
    Failed,
    Skipped,
    #[serde(rename = "rolledback")]
    RolledBack,
}

/// Runtime outcome of one migration execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub from_version: String,
    pub to_version: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<String>,
    pub status: MigrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub run_id: String,
}

/// Execution direction for a migration chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Executes migrations one at a time, recording per-migration outcomes.
pub struct MigrationRunner {
    project_root: PathBuf,
    dry_run: bool,
    run_id: RunId,
    records: Vec<MigrationRecord>,
}

impl MigrationRunner {
    /// Runner for the given project root.
    pub fn new(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            dry_run: false,
            run_id: RunId::generate(),
            records: Vec::new(),
        }
    }

    /// Record outcomes without executing handlers.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Ordered log of outcomes for this run.
    pub fn records(&self) -> &[MigrationRecord] {
        &self.records
    }

    /// Consume the runner, returning its records.
    pub fn into_records(self) -> Vec<MigrationRecord> {
        self.records
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Execute the up handler of one migration.
    ///
    /// On failure the record is marked `failed` and the error is returned
    /// unchanged; the runner does not roll anything back.
    pub fn run_up(&mut self, migration: &MigrationDefinition) -> Result<()> {
        self.run_one(migration, Direction::Up)
    }

    /// Execute the down handler of one migration, swapping the recorded
    /// from/to versions.
    pub fn run_down(&mut self, migration: &MigrationDefinition) -> Result<()> {
        self.run_one(migration, Direction::Down)
    }

    /// Execute migrations strictly in input order, stopping at the first
    /// failure. Later migrations are left untouched, with no record.
    pub fn run_chain(
        &mut self,
        migrations: &[MigrationDefinition],
        direction: Direction,
    ) -> Result<()> {
        for migration in migrations {
            match direction {
                Direction::Up => self.run_up(migration)?,
                Direction::Down => self.run_down(migration)?,
            }
        }
        Ok(())
    }

    fn run_one(&mut self, migration: &MigrationDefinition, direction: Direction) -> Result<()> {
        // Down-runs report the transition in reverse.
        let (from, to) = match direction {
            Direction::Up => (&migration.from_version, &migration.to_version),
            Direction::Down => (&migration.to_version, &migration.from_version),
        };

        info!(
            target: "migrate.run_start",
            from_version = %from,
            to_version = %to,
            dry_run = self.dry_run,
            "Running migration"
        );

        if self.dry_run {
            self.push_record(from, to, migration, MigrationStatus::Skipped, None, None);
            return Ok(());
        }

        let handler = match direction {
            Direction::Up => migration.up.as_ref(),
            Direction::Down => migration.down.as_ref(),
        };
        let result = match handler {
            Some(handler) => self.execute_handler(handler, from, to),
            None => Err(match direction {
                Direction::Up => Error::MissingUpHandler {
                    from_version: from.clone(),
                    to_version: to.clone(),
                },
                Direction::Down => Error::MissingDownHandler {
                    from_version: migration.from_version.clone(),
                    to_version: migration.to_version.clone(),
                },
            }),
        };

        match result {
            Ok(()) => {
                let status = match direction {
                    Direction::Up => MigrationStatus::Applied,
                    Direction::Down => MigrationStatus::RolledBack,
                };
                info!(
                    target: "migrate.run_complete",
                    from_version = %from,
                    to_version = %to,
                    "Migration succeeded"
                );
                self.push_record(
                    from,
                    to,
                    migration,
                    status,
                    Some(Utc::now().to_rfc3339()),
                    None,
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    target: "migrate.run_fail",
                    from_version = %from,
                    to_version = %to,
                    reason = %err,
                    "Migration failed"
                );
                self.push_record(
                    from,
                    to,
                    migration,
                    MigrationStatus::Failed,
                    None,
                    Some(err.to_string()),
                );
                Err(err)
            }
        }
    }

    fn push_record(
        &mut self,
        from: &str,
        to: &str,
        migration: &MigrationDefinition,
        status: MigrationStatus,
        applied_at: Option<String>,
        error: Option<String>,
    ) {
        self.records.push(MigrationRecord {
            from_version: from.to_string(),
            to_version: to.to_string(),
            description: migration.description.clone(),
            applied_at,
            status,
            error,
            run_id: self.run_id.to_string(),
        });
    }

    fn execute_handler(&self, handler: &MigrationHandler, from: &str, to: &str) -> Result<()> {
        match handler {
            MigrationHandler::Sql { statements } => {
                for statement in statements {
                    if statement.trim().is_empty() {
                        return Err(Error::EmptySqlStatement);
                    }
                }
                // Statement execution requires a live connection; declined
                // explicitly rather than pretending success.
                Err(Error::NotImplemented(
                    "executing SQL migration statements".to_string(),
                ))
            }
            MigrationHandler::Code { .. } => Err(Error::NotImplemented(
                "code-based migration handlers".to_string(),
            )),
            MigrationHandler::Script { path } => self.execute_script(path, from, to),
        }
    }

    fn execute_script(&self, path: &str, from: &str, to: &str) -> Result<()> {
        let script = self.project_root.join(path);
        if !script.exists() {
            return Err(Error::ScriptNotFound { path: script });
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&script)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&script, perms)?;
        }

        debug!(
            target: "migrate.script_exec",
            script = %script.display(),
            "Executing migration script"
        );

        // Inherit stdio so script output reaches the operator directly.
        let status = Command::new(&script)
            .current_dir(&self.project_root)
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::MigrationFailed {
                from_version: from.to_string(),
                to_version: to.to_string(),
                reason: format!("script {} exited with {}", script.display(), status),
            })
        }
    }
}
