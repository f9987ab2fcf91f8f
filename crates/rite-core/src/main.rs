//! Rite - ritual lifecycle manager
//!
//! Thin CLI over the update orchestration engine:
//! - Plan and execute template updates
//! - Roll back to the pre-update backup
//! - Manage backups and state checkpoints
//! - Inspect deployment history

use clap::{Args, Parser, Subcommand};
use rite_common::error::format_error_human;
use rite_common::{Error, OutputFormat, Result};
use rite_core::config::EngineConfig;
use rite_core::exit_codes::ExitCode;
use rite_core::logging::{init_logging, LogConfig};
use rite_core::manifest::Manifest;
use rite_core::migrate::validate_chain;
use rite_core::recovery::{backup_size, BackupStore, CheckpointStore};
use rite_core::state::{JsonStateStore, StateStore, RITE_DIR};
use rite_core::update::{
    DeploymentHistory, UpdateContext, UpdateEngine, UpdateOptions,
};
use rite_core::{graph, plan};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Rite - versioned project template updates with safe recovery
#[derive(Parser)]
#[command(name = "rite")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Project directory
    #[arg(long, short = 'p', global = true, default_value = ".", env = "RITE_PROJECT_DIR")]
    project: PathBuf,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

/// Inputs shared by plan/update: manifests and the rendered target tree.
#[derive(Args, Debug)]
struct UpdateInputs {
    /// Current manifest (pre-parsed JSON)
    #[arg(long)]
    current_manifest: PathBuf,

    /// Target manifest (pre-parsed JSON)
    #[arg(long)]
    target_manifest: PathBuf,

    /// Directory with the rendered target file tree
    #[arg(long)]
    target_files: PathBuf,

    /// Additional known manifests for composition validation
    #[arg(long = "known")]
    known: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute an update plan without executing anything
    Plan {
        #[command(flatten)]
        inputs: UpdateInputs,
    },

    /// Execute an update with backup and rollback protection
    Update {
        #[command(flatten)]
        inputs: UpdateInputs,

        /// Plan and record, but execute nothing destructive
        #[arg(long)]
        dry_run: bool,

        /// Continue past a failed migration instead of rolling back
        #[arg(long)]
        force: bool,
    },

    /// Restore the most recent backup
    Rollback,

    /// Validate a manifest's composition and migration chain
    Validate {
        /// Manifest to validate (pre-parsed JSON)
        #[arg(long)]
        manifest: PathBuf,

        /// Additional known manifests
        #[arg(long = "known")]
        known: Vec<PathBuf>,
    },

    /// Manage full project backups
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },

    /// Manage state checkpoints
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },

    /// Show deployment history
    History {
        /// Show only the most recent N entries
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Create a backup of the project directory
    Create {
        /// Free-form description stored in the backup metadata
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List backups, newest first
    List,
    /// Restore a backup over the project directory
    Restore {
        /// Backup path (from `backup list`)
        path: PathBuf,
    },
    /// Delete all but the newest N backups
    Clean {
        /// Backups to keep
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Total size of a backup in bytes
    Size {
        /// Backup path
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum CheckpointCommands {
    /// Checkpoint the current project state
    Create {
        /// Human-readable label
        #[arg(long, default_value = "")]
        label: String,
    },
    /// List checkpoints, newest first
    List,
    /// Restore project state from a checkpoint (by id or label)
    Restore {
        /// Checkpoint id or label
        key: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_env(cli.global.verbose, cli.global.quiet));

    match run(&cli) {
        Ok(code) => code.exit(),
        Err(err) => {
            eprintln!("{}", format_error_human(&err, !cli.global.no_color));
            ExitCode::from_error(&err).exit()
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let project = &cli.global.project;
    let format = cli.global.format;
    let config = EngineConfig::from_env();

    match &cli.command {
        Commands::Plan { inputs } => cmd_plan(project, inputs, format),
        Commands::Update {
            inputs,
            dry_run,
            force,
        } => cmd_update(project, inputs, *dry_run, *force, format),
        Commands::Rollback => cmd_rollback(project),
        Commands::Validate { manifest, known } => cmd_validate(manifest, known),
        Commands::Backup { command } => cmd_backup(project, command, &config, format),
        Commands::Checkpoint { command } => cmd_checkpoint(project, command, &config, format),
        Commands::History { limit } => cmd_history(project, *limit, format),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_plan(project: &Path, inputs: &UpdateInputs, format: OutputFormat) -> Result<ExitCode> {
    let loaded = load_inputs(project, inputs)?;
    let engine = UpdateEngine::new(project);
    let update_plan = engine.plan_update(&loaded.ctx())?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&update_plan.projection())?
        ),
        OutputFormat::Text => print!("{}", plan::generate_report(&update_plan)),
        OutputFormat::Summary => println!(
            "{} -> {}: {} steps, {} conflicts, ~{}s",
            update_plan.current_version,
            update_plan.target_version,
            update_plan.steps.len(),
            update_plan.conflicts.len(),
            update_plan.estimated_duration_secs
        ),
    }

    if update_plan.requires_manual_intervention() {
        Ok(ExitCode::ConflictsFound)
    } else {
        Ok(ExitCode::PlanReady)
    }
}

fn cmd_update(
    project: &Path,
    inputs: &UpdateInputs,
    dry_run: bool,
    force: bool,
    format: OutputFormat,
) -> Result<ExitCode> {
    let loaded = load_inputs(project, inputs)?;
    let engine = UpdateEngine::new(project).with_options(UpdateOptions { dry_run, force });

    match engine.apply_update(&loaded.ctx()) {
        Ok(report) => {
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "status": if report.dry_run { "dry_run" } else { "updated" },
                        "from_version": report.from_version,
                        "to_version": report.to_version,
                        "backup_path": report.backup_path,
                        "migrations": report.migration_records,
                        "hooks": report.hook_outcomes,
                        "warnings": report.warnings,
                    })
                ),
                _ => {
                    println!(
                        "Updated {} -> {}{}",
                        report.from_version,
                        report.to_version,
                        if report.dry_run { " (dry run)" } else { "" }
                    );
                    for warning in &report.warnings {
                        println!("warning: {warning}");
                    }
                }
            }
            Ok(if dry_run {
                ExitCode::PlanReady
            } else {
                ExitCode::Updated
            })
        }
        Err(failure) => {
            // Report the update failure and the rollback outcome distinctly.
            eprintln!("{failure}");
            let code = match &failure.rollback {
                Some(outcome) if outcome.success => ExitCode::RolledBack,
                Some(_) => ExitCode::RollbackFailed,
                None => ExitCode::from_error(&failure.error),
            };
            Ok(code)
        }
    }
}

fn cmd_rollback(project: &Path) -> Result<ExitCode> {
    let engine = UpdateEngine::new(project);
    let outcome = engine.rollback_latest()?;
    if outcome.success {
        println!("Restored from {}", outcome.backup_path.display());
        Ok(ExitCode::RolledBack)
    } else {
        eprintln!(
            "Rollback failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
        Ok(ExitCode::RollbackFailed)
    }
}

fn cmd_validate(manifest_path: &Path, known_paths: &[PathBuf]) -> Result<ExitCode> {
    let manifest = load_manifest(manifest_path)?;
    let known = load_known(known_paths)?;

    graph::ensure_acyclic(&manifest, &known)?;
    validate_chain(&manifest.migrations)?;

    println!("{} {} is valid", manifest.name, manifest.version);
    Ok(ExitCode::Clean)
}

fn cmd_backup(
    project: &Path,
    command: &BackupCommands,
    config: &EngineConfig,
    format: OutputFormat,
) -> Result<ExitCode> {
    let store = BackupStore::new(project);

    match command {
        BackupCommands::Create { description } => {
            let state = JsonStateStore::new(project).load().unwrap_or_default();
            let path = store.create_backup_with_metadata(
                &state.ritual_name,
                &state.ritual_version,
                description,
            )?;
            println!("{}", path.display());
        }
        BackupCommands::List => {
            let backups = store.list_backups()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&backups)?),
                _ => {
                    for backup in &backups {
                        println!(
                            "{}  {}  {}",
                            backup.metadata.created_at,
                            backup.metadata.ritual_version,
                            backup.path.display()
                        );
                    }
                }
            }
        }
        BackupCommands::Restore { path } => {
            store.restore_from_backup(path, project)?;
            println!("Restored from {}", path.display());
        }
        BackupCommands::Clean { keep } => {
            let removed = store.clean_old_backups(keep.unwrap_or(config.backup_retention))?;
            println!("Removed {removed} backup(s)");
        }
        BackupCommands::Size { path } => {
            println!("{}", backup_size(path)?);
        }
    }

    Ok(ExitCode::Clean)
}

fn cmd_checkpoint(
    project: &Path,
    command: &CheckpointCommands,
    config: &EngineConfig,
    format: OutputFormat,
) -> Result<ExitCode> {
    let store = CheckpointStore::new(project).with_max(config.checkpoint_max);
    let state_store = JsonStateStore::new(project);

    match command {
        CheckpointCommands::Create { label } => {
            let state = state_store.load()?;
            let checkpoint = store.create(label, &state)?;
            println!("{}", checkpoint.id);
        }
        CheckpointCommands::List => {
            let checkpoints = store.list()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&checkpoints)?),
                _ => {
                    for checkpoint in &checkpoints {
                        println!(
                            "{}  {}  {}",
                            checkpoint.timestamp, checkpoint.id, checkpoint.label
                        );
                    }
                }
            }
        }
        CheckpointCommands::Restore { key } => {
            let checkpoint = store.resolve(key)?;
            state_store.save(&checkpoint.state)?;
            println!("State restored from {}", checkpoint.id);
        }
    }

    Ok(ExitCode::Clean)
}

fn cmd_history(project: &Path, limit: usize, format: OutputFormat) -> Result<ExitCode> {
    let history = DeploymentHistory::load(project)?;
    let recent = history.recent(limit);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&recent)?),
        _ => {
            for record in &recent {
                println!(
                    "{}  {} -> {}  {:?}  {}",
                    record.timestamp,
                    record.from_version,
                    record.to_version,
                    record.status,
                    record.message
                );
            }
        }
    }

    Ok(ExitCode::Clean)
}

// ---------------------------------------------------------------------------
// Input loading (the CLI-side content/manifest providers)
// ---------------------------------------------------------------------------

struct LoadedInputs {
    current_manifest: Manifest,
    target_manifest: Manifest,
    known: BTreeMap<String, Manifest>,
    current_files: BTreeMap<String, String>,
    target_files: BTreeMap<String, String>,
}

impl LoadedInputs {
    fn ctx(&self) -> UpdateContext<'_> {
        UpdateContext {
            current_manifest: &self.current_manifest,
            target_manifest: &self.target_manifest,
            known_manifests: &self.known,
            current_files: &self.current_files,
            target_files: &self.target_files,
        }
    }
}

fn load_inputs(project: &Path, inputs: &UpdateInputs) -> Result<LoadedInputs> {
    Ok(LoadedInputs {
        current_manifest: load_manifest(&inputs.current_manifest)?,
        target_manifest: load_manifest(&inputs.target_manifest)?,
        known: load_known(&inputs.known)?,
        current_files: collect_files(project, true)?,
        target_files: collect_files(&inputs.target_files, false)?,
    })
}

fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Validation(format!("invalid manifest {}: {e}", path.display())))
}

fn load_known(paths: &[PathBuf]) -> Result<BTreeMap<String, Manifest>> {
    let mut known = BTreeMap::new();
    for path in paths {
        let manifest = load_manifest(path)?;
        known.insert(manifest.name.clone(), manifest);
    }
    Ok(known)
}

/// Read a tree into a name -> content map. `skip_rite` excludes the
/// project's `.rite/` store from comparison.
fn collect_files(root: &Path, skip_rite: bool) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .expect("walkdir yields paths under its root");
        if skip_rite && rel.starts_with(RITE_DIR) {
            continue;
        }
        // Non-UTF-8 files are outside the template contract; skipped.
        if let Ok(content) = fs::read_to_string(entry.path()) {
            files.insert(rel.to_string_lossy().replace('\\', "/"), content);
        }
    }
    Ok(files)
}
