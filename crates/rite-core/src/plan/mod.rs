//! Deployment plan generation.
//!
//! Converts version classification, change-set analysis, and the target
//! manifest's migration/hook lists into a deterministic ordered plan with
//! time estimates and a conflict list. The plan is built fresh per call and
//! may be serialized for inspection; it is not authoritative state.

use crate::changeset::ChangeSet;
use crate::manifest::Manifest;
use crate::version::{classify, parse_version};
use rite_common::Result;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// Kind of a deployment step. Order of steps in a plan is significant:
/// backup is always first, validation always last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Backup,
    UpdateFiles,
    Migration,
    RunHooks,
    Validation,
    Rollback,
}

/// Fixed default duration estimate per step kind, in seconds.
pub fn default_duration_secs(kind: StepKind) -> u64 {
    match kind {
        StepKind::Backup => 5,
        StepKind::Migration => 10,
        StepKind::UpdateFiles => 2,
        StepKind::RunHooks => 3,
        StepKind::Validation => 2,
        StepKind::Rollback => 1,
    }
}

/// A single ordered step in a deployment plan.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentStep {
    pub kind: StepKind,
    pub description: String,
    /// Explicit estimate; the kind's default applies when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration_secs: Option<u64>,
    pub required: bool,
}

impl DeploymentStep {
    pub fn new(kind: StepKind, description: impl Into<String>, required: bool) -> Self {
        Self {
            kind,
            description: description.into(),
            estimated_duration_secs: None,
            required,
        }
    }

    /// The step's explicit estimate or its kind's default.
    pub fn effective_duration_secs(&self) -> u64 {
        self.estimated_duration_secs
            .unwrap_or_else(|| default_duration_secs(self.kind))
    }
}

/// A conflict the operator must resolve before or after updating.
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    /// Affected file, when the conflict is file-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub reason: String,
    pub resolution_hint: String,
}

/// Ordered update plan between two ritual versions.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentPlan {
    pub current_version: String,
    pub target_version: String,
    pub steps: Vec<DeploymentStep>,
    pub conflicts: Vec<Conflict>,
    pub files_to_add: Vec<String>,
    pub files_to_modify: Vec<String>,
    pub files_to_delete: Vec<String>,
    /// Target versions of migrations the update will run, in order.
    pub migrations_to_run: Vec<String>,
    pub estimated_duration_secs: u64,
}

impl DeploymentPlan {
    /// Sum per-step estimates (explicit or default), store the total on the
    /// plan, and return it.
    pub fn estimate_duration(&mut self) -> u64 {
        self.estimated_duration_secs = self
            .steps
            .iter()
            .map(DeploymentStep::effective_duration_secs)
            .sum();
        self.estimated_duration_secs
    }

    /// True iff the plan carries any conflict.
    pub fn requires_manual_intervention(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// JSON projection for external consumers.
    pub fn projection(&self) -> PlanProjection {
        PlanProjection {
            current_version: self.current_version.clone(),
            target_version: self.target_version.clone(),
            files: FileChanges {
                to_add: self.files_to_add.clone(),
                to_modify: self.files_to_modify.clone(),
                to_delete: self.files_to_delete.clone(),
            },
            migrations: self.migrations_to_run.clone(),
            conflicts: self.conflicts.clone(),
            estimated_duration_seconds: self.estimated_duration_secs,
            requires_manual_intervention: self.requires_manual_intervention(),
        }
    }
}

/// File-change lists in the plan projection.
#[derive(Debug, Clone, Serialize)]
pub struct FileChanges {
    pub to_add: Vec<String>,
    pub to_modify: Vec<String>,
    pub to_delete: Vec<String>,
}

/// The externally-consumed plan document shape.
#[derive(Debug, Clone, Serialize)]
pub struct PlanProjection {
    pub current_version: String,
    pub target_version: String,
    pub files: FileChanges,
    pub migrations: Vec<String>,
    pub conflicts: Vec<Conflict>,
    pub estimated_duration_seconds: u64,
    pub requires_manual_intervention: bool,
}

// ---------------------------------------------------------------------------
// Plan construction
// ---------------------------------------------------------------------------

/// Build an ordered deployment plan.
///
/// `applied_versions` filters migrations already recorded in project state;
/// the remaining migrations keep the manifest's declared order.
pub fn analyze(
    current: &Manifest,
    target: &Manifest,
    changes: &ChangeSet,
    applied_versions: &[String],
) -> Result<DeploymentPlan> {
    let current_version = parse_version(&current.version)?;
    let target_version = parse_version(&target.version)?;
    let change = classify(&current_version, &target_version);

    let mut steps = Vec::new();
    let mut conflicts = Vec::new();
    let mut migrations_to_run = Vec::new();

    // Backup always comes first.
    steps.push(DeploymentStep::new(
        StepKind::Backup,
        "Create full project backup",
        true,
    ));

    if !changes.added.is_empty() || !changes.modified.is_empty() {
        steps.push(DeploymentStep::new(
            StepKind::UpdateFiles,
            format!(
                "Update project files ({} added, {} modified)",
                changes.added.len(),
                changes.modified.len()
            ),
            true,
        ));
    }

    for migration in &target.migrations {
        if applied_versions.iter().any(|v| v == &migration.to_version) {
            continue;
        }
        let description = if migration.description.is_empty() {
            format!(
                "Apply migration {} -> {}",
                migration.from_version, migration.to_version
            )
        } else {
            format!(
                "Apply migration {} -> {}: {}",
                migration.from_version, migration.to_version, migration.description
            )
        };
        steps.push(DeploymentStep::new(StepKind::Migration, description, true));
        migrations_to_run.push(migration.to_version.clone());
    }

    if !target.post_update_hooks.is_empty() {
        steps.push(DeploymentStep::new(
            StepKind::RunHooks,
            format!("Run {} post-update hook(s)", target.post_update_hooks.len()),
            false,
        ));
    }

    // Validation always comes last.
    steps.push(DeploymentStep::new(
        StepKind::Validation,
        "Validate updated project",
        true,
    ));

    if change.breaking {
        conflicts.push(Conflict {
            file: None,
            reason: format!(
                "version {} introduces breaking changes over {}",
                target.version, current.version
            ),
            resolution_hint: "Review the ritual changelog and update usages before proceeding"
                .to_string(),
        });
    }

    for file in &changes.conflicts {
        conflicts.push(Conflict {
            file: Some(file.clone()),
            reason: "protected file would be modified by the update".to_string(),
            resolution_hint: "Merge the template changes into this file manually".to_string(),
        });
    }

    let mut plan = DeploymentPlan {
        current_version: current.version.clone(),
        target_version: target.version.clone(),
        steps,
        conflicts,
        files_to_add: changes.added.clone(),
        files_to_modify: changes.modified.clone(),
        files_to_delete: changes.deleted.clone(),
        migrations_to_run,
        estimated_duration_secs: 0,
    };
    plan.estimate_duration();
    Ok(plan)
}

/// Flag files both manually modified by the user and touched by the update.
pub fn detect_conflicts(manually_modified: &[String], touched: &[String]) -> Vec<Conflict> {
    let mut conflicts: Vec<Conflict> = manually_modified
        .iter()
        .filter(|f| touched.contains(f))
        .map(|f| Conflict {
            file: Some(f.clone()),
            reason: "file was modified locally and is targeted by the update".to_string(),
            resolution_hint: "Back up local edits, then re-apply them after the update".to_string(),
        })
        .collect();
    conflicts.sort_by(|a, b| a.file.cmp(&b.file));
    conflicts
}

// ---------------------------------------------------------------------------
// Text report
// ---------------------------------------------------------------------------

/// Deterministic textual projection of a plan.
pub fn generate_report(plan: &DeploymentPlan) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Update plan: {} -> {}\n",
        plan.current_version, plan.target_version
    ));

    let file_section = |out: &mut String, title: &str, marker: char, files: &[String]| {
        if files.is_empty() {
            return;
        }
        out.push_str(&format!("\n{} ({}):\n", title, files.len()));
        for file in files {
            out.push_str(&format!("  {} {}\n", marker, file));
        }
    };
    file_section(&mut out, "Files to add", '+', &plan.files_to_add);
    file_section(&mut out, "Files to modify", '~', &plan.files_to_modify);
    file_section(&mut out, "Files to delete", '-', &plan.files_to_delete);

    if !plan.migrations_to_run.is_empty() {
        out.push_str(&format!(
            "\nMigrations ({}):\n",
            plan.migrations_to_run.len()
        ));
        for version in &plan.migrations_to_run {
            out.push_str(&format!("  * -> {}\n", version));
        }
    }

    out.push_str("\nSteps:\n");
    for (i, step) in plan.steps.iter().enumerate() {
        let required = if step.required { "[required] " } else { "" };
        out.push_str(&format!(
            "  {}. {}{} (~{}s)\n",
            i + 1,
            required,
            step.description,
            step.effective_duration_secs()
        ));
    }

    if !plan.conflicts.is_empty() {
        out.push_str(&format!("\nConflicts ({}):\n", plan.conflicts.len()));
        for conflict in &plan.conflicts {
            match &conflict.file {
                Some(file) => out.push_str(&format!("  ! {}: {}\n", file, conflict.reason)),
                None => out.push_str(&format!("  ! {}\n", conflict.reason)),
            }
            out.push_str(&format!("    hint: {}\n", conflict.resolution_hint));
        }
    }

    out.push_str(&format!(
        "\nEstimated duration: ~{}s\n",
        plan.estimated_duration_secs
    ));
    out
}
