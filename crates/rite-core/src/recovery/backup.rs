//! Full-directory backup creation and management.

use chrono::{DateTime, Utc};
use rite_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::state::{write_json_pretty_atomic, RITE_DIR};

/// Subdirectory of `.rite/` holding backup snapshots.
const BACKUPS_SUBDIR: &str = "backups";

/// Metadata stored alongside each backup snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Ritual the project was scaffolded from.
    pub ritual_name: String,
    /// Ritual version at backup time.
    pub ritual_version: String,
    /// Free-form description (e.g. "pre-update to 2.0.0").
    pub description: String,
    /// Timestamp when the backup was created (RFC 3339).
    pub created_at: String,
    /// Project directory the snapshot was taken from.
    pub source_path: String,
}

impl BackupMetadata {
    /// Load metadata from a JSON sidecar file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// A backup snapshot with its resolved metadata.
#[derive(Debug, Clone, Serialize)]
pub struct BackupSnapshot {
    /// Snapshot directory; this path is the backup's external address.
    pub path: PathBuf,
    pub metadata: BackupMetadata,
}

impl BackupSnapshot {
    pub fn created_at(&self) -> &str {
        &self.metadata.created_at
    }
}

/// Store for full-directory backups of one project.
///
/// Snapshots live under `<project>/.rite/backups/backup-<timestamp>/` with a
/// `backup-<timestamp>.json` metadata sidecar next to each snapshot
/// directory. The timestamp has millisecond resolution and is the snapshot's
/// identity.
pub struct BackupStore {
    project_dir: PathBuf,
    backup_dir: PathBuf,
}

impl BackupStore {
    /// Store rooted at the given project directory.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            backup_dir: project_dir.join(RITE_DIR).join(BACKUPS_SUBDIR),
        }
    }

    /// Store with a custom backup directory (tests, alternate layouts).
    pub fn with_backup_dir(project_dir: &Path, backup_dir: PathBuf) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            backup_dir,
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Create a backup with empty metadata.
    pub fn create_backup(&self) -> Result<PathBuf> {
        self.create_backup_with_metadata("", "", "")
    }

    /// Recursively copy the project into a new uniquely-timestamped snapshot
    /// directory, excluding the backup store's own subtree, and write the
    /// metadata sidecar. Returns the snapshot path.
    pub fn create_backup_with_metadata(
        &self,
        ritual_name: &str,
        ritual_version: &str,
        description: &str,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.backup_dir)?;

        let timestamp = Utc::now();
        let backup_name = format!("backup-{}", timestamp.format("%Y%m%d-%H%M%S-%3f"));
        let snapshot_dir = self.backup_dir.join(&backup_name);

        info!(
            target: "recovery.backup_start",
            snapshot = %snapshot_dir.display(),
            "Creating project backup"
        );

        copy_tree(&self.project_dir, &snapshot_dir, Some(&self.backup_dir))?;

        let metadata = BackupMetadata {
            ritual_name: ritual_name.to_string(),
            ritual_version: ritual_version.to_string(),
            description: description.to_string(),
            created_at: timestamp.to_rfc3339(),
            source_path: self.project_dir.display().to_string(),
        };
        let sidecar = self.backup_dir.join(format!("{backup_name}.json"));
        write_json_pretty_atomic(&sidecar, &metadata)?;

        info!(
            target: "recovery.backup_complete",
            snapshot = %snapshot_dir.display(),
            "Backup created"
        );

        Ok(snapshot_dir)
    }

    /// Copy a snapshot back over `target_dir`, overwriting files of the same
    /// name. Files present in `target_dir` but absent from the backup are
    /// left in place; restoration is additive, and safe to re-run.
    pub fn restore_from_backup(&self, backup_path: &Path, target_dir: &Path) -> Result<()> {
        if !backup_path.exists() {
            return Err(Error::BackupNotFound {
                path: backup_path.to_path_buf(),
            });
        }

        info!(
            target: "recovery.restore_start",
            snapshot = %backup_path.display(),
            target = %target_dir.display(),
            "Restoring from backup"
        );

        copy_tree(backup_path, target_dir, None)?;

        info!(
            target: "recovery.restore_complete",
            snapshot = %backup_path.display(),
            "Restore finished"
        );
        Ok(())
    }

    /// All snapshots, newest first. A snapshot whose sidecar is unreadable
    /// falls back to directory-modification-time metadata instead of being
    /// dropped.
    pub fn list_backups(&self) -> Result<Vec<BackupSnapshot>> {
        if !self.backup_dir.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            if !name.starts_with("backup-") {
                continue;
            }

            let sidecar = self.backup_dir.join(format!("{name}.json"));
            let metadata = match BackupMetadata::load(&sidecar) {
                Ok(metadata) => metadata,
                Err(_) => {
                    debug!(
                        target: "recovery.sidecar_missing",
                        snapshot = %path.display(),
                        "Metadata sidecar unreadable; using directory mtime"
                    );
                    fallback_metadata(&path)?
                }
            };

            snapshots.push(BackupSnapshot { path, metadata });
        }

        snapshots.sort_by(|a, b| b.metadata.created_at.cmp(&a.metadata.created_at));
        Ok(snapshots)
    }

    /// The most recent snapshot, if any.
    pub fn latest_backup(&self) -> Result<Option<BackupSnapshot>> {
        Ok(self.list_backups()?.into_iter().next())
    }

    /// Delete every snapshot beyond the `keep_count` newest. Returns the
    /// number of snapshots removed.
    pub fn clean_old_backups(&self, keep_count: usize) -> Result<usize> {
        let snapshots = self.list_backups()?;
        let mut removed = 0;

        for snapshot in snapshots.into_iter().skip(keep_count) {
            fs::remove_dir_all(&snapshot.path)?;
            let sidecar = snapshot.path.with_extension("json");
            if sidecar.exists() {
                fs::remove_file(&sidecar)?;
            }
            removed += 1;
        }

        Ok(removed)
    }
}

/// Total size in bytes of all files under a backup path.
pub fn backup_size(path: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(|e| Error::Io(e.into()))?.len();
        }
    }
    Ok(total)
}

/// Recursively copy `src` into `dst`, preserving permission bits and
/// skipping everything under `exclude`.
fn copy_tree(src: &Path, dst: &Path, exclude: Option<&Path>) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let path = entry.path();

        if let Some(excluded) = exclude {
            if path.starts_with(excluded) {
                continue;
            }
        }

        let rel = path
            .strip_prefix(src)
            .expect("walkdir yields paths under its root");
        if rel.as_os_str().is_empty() {
            fs::create_dir_all(dst)?;
            continue;
        }
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &target)?;
            let perms = fs::metadata(path)?.permissions();
            fs::set_permissions(&target, perms)?;
        }
        // Symlinks and other special files are not part of scaffolded
        // projects; skipped.
    }
    Ok(())
}

fn fallback_metadata(path: &Path) -> Result<BackupMetadata> {
    let modified = fs::metadata(path)?.modified()?;
    let created_at: DateTime<Utc> = modified.into();
    Ok(BackupMetadata {
        ritual_name: String::new(),
        ritual_version: String::new(),
        description: String::new(),
        created_at: created_at.to_rfc3339(),
        source_path: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_project(dir: &Path) {
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(dir.join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();
        fs::write(dir.join("src/main.rs"), "fn main() {}\n").unwrap();
    }

    #[test]
    fn test_create_and_list_backups() {
        let temp = TempDir::new().unwrap();
        seed_project(temp.path());
        let store = BackupStore::new(temp.path());

        let snapshot = store
            .create_backup_with_metadata("rust-service", "1.0.0", "pre-update")
            .unwrap();
        assert!(snapshot.join("Cargo.toml").exists());
        assert!(snapshot.join("src/main.rs").exists());

        let backups = store.list_backups().unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].metadata.ritual_name, "rust-service");
        assert_eq!(backups[0].metadata.ritual_version, "1.0.0");
    }

    #[test]
    fn test_backup_excludes_backup_store() {
        let temp = TempDir::new().unwrap();
        seed_project(temp.path());
        let store = BackupStore::new(temp.path());

        store.create_backup().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.create_backup().unwrap();

        // The second snapshot must not contain the first one.
        assert!(!second.join(RITE_DIR).join(BACKUPS_SUBDIR).exists());
    }

    #[test]
    fn test_restore_round_trip() {
        let temp = TempDir::new().unwrap();
        seed_project(temp.path());
        let store = BackupStore::new(temp.path());

        let original = fs::read(temp.path().join("src/main.rs")).unwrap();
        let snapshot = store.create_backup().unwrap();

        fs::write(temp.path().join("src/main.rs"), "fn main() { panic!() }\n").unwrap();
        store.restore_from_backup(&snapshot, temp.path()).unwrap();

        let restored = fs::read(temp.path().join("src/main.rs")).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_restore_is_additive() {
        let temp = TempDir::new().unwrap();
        seed_project(temp.path());
        let store = BackupStore::new(temp.path());

        let snapshot = store.create_backup().unwrap();
        fs::write(temp.path().join("new-file.txt"), "created after backup").unwrap();

        store.restore_from_backup(&snapshot, temp.path()).unwrap();
        // Files created after the backup survive a restore.
        assert!(temp.path().join("new-file.txt").exists());
    }

    #[test]
    fn test_restore_rerun_is_harmless() {
        let temp = TempDir::new().unwrap();
        seed_project(temp.path());
        let store = BackupStore::new(temp.path());

        let snapshot = store.create_backup().unwrap();
        store.restore_from_backup(&snapshot, temp.path()).unwrap();
        store.restore_from_backup(&snapshot, temp.path()).unwrap();
        assert!(temp.path().join("src/main.rs").exists());
    }

    #[test]
    fn test_restore_missing_backup() {
        let temp = TempDir::new().unwrap();
        let store = BackupStore::new(temp.path());
        let err = store
            .restore_from_backup(Path::new("/nonexistent/backup"), temp.path())
            .unwrap_err();
        assert!(matches!(err, Error::BackupNotFound { .. }));
    }

    #[test]
    fn test_clean_old_backups_keeps_newest() {
        let temp = TempDir::new().unwrap();
        seed_project(temp.path());
        let store = BackupStore::new(temp.path());

        for _ in 0..4 {
            store.create_backup().unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let removed = store.clean_old_backups(2).unwrap();
        assert_eq!(removed, 2);

        let remaining = store.list_backups().unwrap();
        assert_eq!(remaining.len(), 2);
        // Newest-first ordering survives cleaning.
        assert!(remaining[0].metadata.created_at >= remaining[1].metadata.created_at);
    }

    #[test]
    fn test_clean_with_fewer_than_keep() {
        let temp = TempDir::new().unwrap();
        seed_project(temp.path());
        let store = BackupStore::new(temp.path());
        store.create_backup().unwrap();

        assert_eq!(store.clean_old_backups(5).unwrap(), 0);
        assert_eq!(store.list_backups().unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_sidecar_falls_back_to_mtime() {
        let temp = TempDir::new().unwrap();
        seed_project(temp.path());
        let store = BackupStore::new(temp.path());

        let snapshot = store.create_backup().unwrap();
        let sidecar = snapshot.with_extension("json");
        fs::write(&sidecar, "{broken").unwrap();

        let backups = store.list_backups().unwrap();
        assert_eq!(backups.len(), 1);
        assert!(!backups[0].metadata.created_at.is_empty());
    }

    #[test]
    fn test_backup_size() {
        let temp = TempDir::new().unwrap();
        seed_project(temp.path());
        let store = BackupStore::new(temp.path());
        let snapshot = store.create_backup().unwrap();

        let expected: u64 = ["Cargo.toml", "src/main.rs"]
            .iter()
            .map(|f| fs::metadata(temp.path().join(f)).unwrap().len())
            .sum();
        assert_eq!(backup_size(&snapshot).unwrap(), expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_bits_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        seed_project(temp.path());
        let script = temp.path().join("hook.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        let mut perms = fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).unwrap();

        let store = BackupStore::new(temp.path());
        let snapshot = store.create_backup().unwrap();

        let mode = fs::metadata(snapshot.join("hook.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_list_backups_empty_store() {
        let temp = TempDir::new().unwrap();
        let store = BackupStore::new(temp.path());
        assert!(store.list_backups().unwrap().is_empty());
        assert!(store.latest_backup().unwrap().is_none());
    }
}
