//! Snapshot and recovery management.
//!
//! Two tiers of protection before destructive update steps:
//! - Full-directory backups with a metadata sidecar per snapshot
//! - Lightweight state-only checkpoints, auto-pruned on creation
//!
//! Both stores take the project root as an explicit constructor argument
//! and are passed through the orchestrator call chain; there is no global
//! store.

mod backup;
mod checkpoint;

pub use backup::{backup_size, BackupMetadata, BackupSnapshot, BackupStore};
pub use checkpoint::{Checkpoint, CheckpointStore, DEFAULT_CHECKPOINT_MAX};

/// Default number of full backups to retain when cleaning.
pub const DEFAULT_BACKUP_RETENTION: usize = 5;
