//! Update orchestration: plan, execute, and recover.
//!
//! The engine wires the leaf components together for one logical update
//! operation: validate the composed manifests, produce a plan, capture a
//! backup, apply file changes, run pending migrations, and on migration
//! failure restore the just-created backup. A failed update must never
//! leave the project worse than before the attempt.

mod apply;
mod history;

pub use apply::{FileApplier, FsFileApplier};
pub use history::{
    DeploymentHistory, DeploymentHistoryRecord, UpdateStatus, MAX_HISTORY_ENTRIES,
};

use crate::changeset::{diff, ChangeSet};
use crate::graph;
use crate::hooks::{HookOutcome, HookRegistry};
use crate::manifest::Manifest;
use crate::migrate::{
    validate_chain, Direction, MigrationDefinition, MigrationRecord, MigrationRunner,
    MigrationStatus,
};
use crate::plan::{analyze, DeploymentPlan};
use crate::recovery::BackupStore;
use crate::state::{AppliedMigration, JsonStateStore, ProjectState, StateStore};
use chrono::Utc;
use rite_common::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// Inputs and outcomes
// ---------------------------------------------------------------------------

/// Caller-supplied inputs for one update operation.
///
/// File content maps come from the external content provider; the engine
/// does not read the project tree for diffing.
pub struct UpdateContext<'a> {
    pub current_manifest: &'a Manifest,
    pub target_manifest: &'a Manifest,
    /// All known manifests, for composition validation.
    pub known_manifests: &'a BTreeMap<String, Manifest>,
    pub current_files: &'a BTreeMap<String, String>,
    pub target_files: &'a BTreeMap<String, String>,
}

/// Orchestration options.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Plan and record, but execute nothing destructive.
    pub dry_run: bool,
    /// Continue past a failed migration instead of rolling back.
    pub force: bool,
}

/// Outcome of restoring the pre-update backup.
#[derive(Debug, Clone)]
pub struct RollbackOutcome {
    pub success: bool,
    pub backup_path: PathBuf,
    pub error: Option<String>,
}

/// A failed update, with the rollback outcome when one was attempted.
///
/// Carrying both causes structurally lets callers report "update failed"
/// and "rollback succeeded/failed" distinctly.
#[derive(Debug)]
pub struct UpdateFailure {
    pub error: Error,
    pub rollback: Option<RollbackOutcome>,
}

impl std::fmt::Display for UpdateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "update failed: {}", self.error)?;
        match &self.rollback {
            Some(outcome) if outcome.success => {
                write!(f, "; project restored from {}", outcome.backup_path.display())
            }
            Some(outcome) => write!(
                f,
                "; rollback also failed: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
            None => Ok(()),
        }
    }
}

impl std::error::Error for UpdateFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<Error> for UpdateFailure {
    fn from(error: Error) -> Self {
        Self {
            error,
            rollback: None,
        }
    }
}

/// Outcome of a completed update.
#[derive(Debug)]
pub struct UpdateReport {
    pub from_version: String,
    pub to_version: String,
    pub plan: DeploymentPlan,
    pub backup_path: Option<PathBuf>,
    pub migration_records: Vec<MigrationRecord>,
    pub hook_outcomes: Vec<HookOutcome>,
    pub warnings: Vec<String>,
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Orchestrates one update operation against a project directory.
pub struct UpdateEngine {
    project_dir: PathBuf,
    backup_store: BackupStore,
    state_store: Box<dyn StateStore>,
    applier: Box<dyn FileApplier>,
    hooks: HookRegistry,
    options: UpdateOptions,
}

impl UpdateEngine {
    /// Engine with filesystem-backed stores for the given project root.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            backup_store: BackupStore::new(project_dir),
            state_store: Box::new(JsonStateStore::new(project_dir)),
            applier: Box::new(FsFileApplier),
            hooks: HookRegistry::new(),
            options: UpdateOptions::default(),
        }
    }

    pub fn with_state_store(mut self, store: Box<dyn StateStore>) -> Self {
        self.state_store = store;
        self
    }

    pub fn with_applier(mut self, applier: Box<dyn FileApplier>) -> Self {
        self.applier = applier;
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_options(mut self, options: UpdateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn backup_store(&self) -> &BackupStore {
        &self.backup_store
    }

    /// Validate composition and produce a plan without executing anything.
    pub fn plan_update(&self, ctx: &UpdateContext<'_>) -> Result<DeploymentPlan> {
        let (_, _, plan, _) = self.prepare(ctx)?;
        Ok(plan)
    }

    /// Execute a full update.
    ///
    /// On migration failure the pre-update backup is restored unless
    /// `force` was set; the returned [`UpdateFailure`] reports the primary
    /// error and the rollback outcome separately.
    pub fn apply_update(
        &self,
        ctx: &UpdateContext<'_>,
    ) -> std::result::Result<UpdateReport, UpdateFailure> {
        let started = Instant::now();
        let from_version = ctx.current_manifest.version.clone();
        let to_version = ctx.target_manifest.version.clone();

        info!(
            target: "update.start",
            from_version = %from_version,
            to_version = %to_version,
            dry_run = self.options.dry_run,
            "Starting update"
        );

        let (state, changes, plan, pending) = self.prepare(ctx)?;
        let mut warnings = Vec::new();

        if self.options.dry_run {
            let mut runner = MigrationRunner::new(&self.project_dir).dry_run(true);
            // Dry-run records every pending migration as skipped.
            runner
                .run_chain(&pending, Direction::Up)
                .map_err(UpdateFailure::from)?;
            return Ok(UpdateReport {
                from_version,
                to_version,
                plan,
                backup_path: None,
                migration_records: runner.into_records(),
                hook_outcomes: Vec::new(),
                warnings,
                dry_run: true,
            });
        }

        // Nothing destructive may happen before this backup exists.
        let backup_path = self
            .backup_store
            .create_backup_with_metadata(
                &state.ritual_name,
                &state.ritual_version,
                &format!("pre-update to {to_version}"),
            )
            .map_err(UpdateFailure::from)?;

        if let Err(err) = self
            .applier
            .apply(&self.project_dir, &changes, ctx.target_files)
        {
            return Err(self.fail_with_rollback(
                err,
                &backup_path,
                &from_version,
                &to_version,
                started.elapsed().as_secs_f64(),
            ));
        }

        let mut runner = MigrationRunner::new(&self.project_dir);
        let migration_result = runner.run_chain(&pending, Direction::Up);

        if let Err(err) = migration_result {
            if self.options.force {
                warn!(
                    target: "update.force_continue",
                    reason = %err,
                    "Migration failed; continuing because force was requested"
                );
                self.persist_success(ctx, &state, runner.records())
                    .map_err(UpdateFailure::from)?;
                self.record_history(
                    &from_version,
                    &to_version,
                    UpdateStatus::Failure,
                    "migration failed; update kept due to force",
                    vec![err.to_string()],
                    warnings,
                    started.elapsed().as_secs_f64(),
                );
                return Err(UpdateFailure {
                    error: err,
                    rollback: None,
                });
            }
            return Err(self.fail_with_rollback(
                err,
                &backup_path,
                &from_version,
                &to_version,
                started.elapsed().as_secs_f64(),
            ));
        }

        let hook_outcomes = if ctx.target_manifest.post_update_hooks.is_empty() {
            Vec::new()
        } else {
            let outcomes = self
                .hooks
                .run_hooks(&ctx.target_manifest.post_update_hooks, &self.project_dir);
            for failed in outcomes.iter().filter(|o| !o.success) {
                warnings.push(format!(
                    "hook '{}' failed: {}",
                    failed.name,
                    failed.error.as_deref().unwrap_or("unknown error")
                ));
            }
            outcomes
        };

        self.persist_success(ctx, &state, runner.records())
            .map_err(UpdateFailure::from)?;

        self.record_history(
            &from_version,
            &to_version,
            UpdateStatus::Success,
            "update completed",
            Vec::new(),
            warnings.clone(),
            started.elapsed().as_secs_f64(),
        );

        info!(
            target: "update.complete",
            to_version = %to_version,
            "Update completed"
        );

        Ok(UpdateReport {
            from_version,
            to_version,
            plan,
            backup_path: Some(backup_path),
            migration_records: runner.into_records(),
            hook_outcomes,
            warnings,
            dry_run: false,
        })
    }

    /// Restore the most recent backup, recording the outcome in history.
    pub fn rollback_latest(&self) -> Result<RollbackOutcome> {
        let snapshot = self.backup_store.latest_backup()?.ok_or_else(|| {
            Error::BackupNotFound {
                path: self.backup_store.backup_dir().to_path_buf(),
            }
        })?;

        let outcome = self.restore(&snapshot.path);
        self.record_history(
            &snapshot.metadata.ritual_version,
            &snapshot.metadata.ritual_version,
            UpdateStatus::Rollback,
            "manual rollback",
            outcome.error.iter().cloned().collect(),
            Vec::new(),
            0.0,
        );
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Shared validation and planning for plan-only and full updates.
    fn prepare(
        &self,
        ctx: &UpdateContext<'_>,
    ) -> Result<(ProjectState, ChangeSet, DeploymentPlan, Vec<MigrationDefinition>)> {
        let state = self.state_store.load()?;

        graph::ensure_acyclic(ctx.target_manifest, ctx.known_manifests)?;

        let mut protected = ctx.target_manifest.protected_files.clone();
        for pattern in &state.protected_files {
            if !protected.contains(pattern) {
                protected.push(pattern.clone());
            }
        }

        let changes = diff(ctx.current_files, ctx.target_files, &protected);
        let applied = state.applied_versions();
        let plan = analyze(ctx.current_manifest, ctx.target_manifest, &changes, &applied)?;

        let pending: Vec<MigrationDefinition> = ctx
            .target_manifest
            .migrations
            .iter()
            .filter(|m| !state.has_applied(&m.to_version))
            .cloned()
            .collect();
        validate_chain(&pending)?;

        Ok((state, changes, plan, pending))
    }

    fn restore(&self, backup_path: &Path) -> RollbackOutcome {
        match self
            .backup_store
            .restore_from_backup(backup_path, &self.project_dir)
        {
            Ok(()) => RollbackOutcome {
                success: true,
                backup_path: backup_path.to_path_buf(),
                error: None,
            },
            Err(err) => {
                error!(
                    target: "update.rollback_fail",
                    reason = %err,
                    "Rollback failed"
                );
                RollbackOutcome {
                    success: false,
                    backup_path: backup_path.to_path_buf(),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    fn fail_with_rollback(
        &self,
        err: Error,
        backup_path: &Path,
        from_version: &str,
        to_version: &str,
        duration_secs: f64,
    ) -> UpdateFailure {
        warn!(
            target: "update.rollback_start",
            reason = %err,
            backup = %backup_path.display(),
            "Update failed; restoring backup"
        );

        let outcome = self.restore(backup_path);
        let (status, message) = if outcome.success {
            (UpdateStatus::Rollback, "update failed; restored from backup")
        } else {
            (UpdateStatus::Failure, "update failed and rollback failed")
        };

        let mut errors = vec![err.to_string()];
        if let Some(rollback_err) = &outcome.error {
            errors.push(rollback_err.clone());
        }
        self.record_history(
            from_version,
            to_version,
            status,
            message,
            errors,
            Vec::new(),
            duration_secs,
        );

        UpdateFailure {
            error: err,
            rollback: Some(outcome),
        }
    }

    fn persist_success(
        &self,
        ctx: &UpdateContext<'_>,
        state: &ProjectState,
        records: &[MigrationRecord],
    ) -> Result<()> {
        let mut next = state.clone();
        next.ritual_name = ctx.target_manifest.name.clone();
        next.ritual_version = ctx.target_manifest.version.clone();
        for record in records
            .iter()
            .filter(|r| r.status == MigrationStatus::Applied)
        {
            next.applied_migrations.push(AppliedMigration {
                version: record.to_version.clone(),
                applied_at: record
                    .applied_at
                    .clone()
                    .unwrap_or_else(|| Utc::now().to_rfc3339()),
            });
        }
        self.state_store.save(&next)
    }

    /// History writes are best-effort; a failure to record must not change
    /// the update outcome.
    #[allow(clippy::too_many_arguments)]
    fn record_history(
        &self,
        from_version: &str,
        to_version: &str,
        status: UpdateStatus,
        message: &str,
        errors: Vec<String>,
        warnings: Vec<String>,
        duration_secs: f64,
    ) {
        let result = DeploymentHistory::load(&self.project_dir).and_then(|mut history| {
            history.push(DeploymentHistoryRecord {
                timestamp: Utc::now().to_rfc3339(),
                from_version: from_version.to_string(),
                to_version: to_version.to_string(),
                status,
                message: message.to_string(),
                errors,
                warnings,
                duration_secs,
            });
            history.save(&self.project_dir)
        });
        if let Err(err) = result {
            warn!(
                target: "update.history_fail",
                reason = %err,
                "Could not record deployment history"
            );
        }
    }
}
