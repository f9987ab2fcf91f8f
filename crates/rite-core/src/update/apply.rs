//! File application seam.
//!
//! The engine computes what changes; writing the project tree is delegated
//! through [`FileApplier`] so frontends can substitute their own writer
//! (e.g. one that renders templates first). The bundled implementation
//! writes the supplied content maps directly.

use crate::changeset::ChangeSet;
use rite_common::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Applies a computed change set to a project directory.
pub trait FileApplier {
    /// Write added and modified files, delete removed ones. Conflict files
    /// are never touched.
    fn apply(
        &self,
        project_dir: &Path,
        changes: &ChangeSet,
        target_files: &BTreeMap<String, String>,
    ) -> Result<()>;
}

/// Direct filesystem applier: target map content is written verbatim.
#[derive(Debug, Default)]
pub struct FsFileApplier;

impl FileApplier for FsFileApplier {
    fn apply(
        &self,
        project_dir: &Path,
        changes: &ChangeSet,
        target_files: &BTreeMap<String, String>,
    ) -> Result<()> {
        for name in changes.added.iter().chain(&changes.modified) {
            let Some(content) = target_files.get(name) else {
                continue;
            };
            let path = project_dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            debug!(target: "update.write_file", file = %name, "Writing file");
            fs::write(&path, content)?;
        }

        for name in &changes.deleted {
            let path = project_dir.join(name);
            if path.exists() {
                debug!(target: "update.delete_file", file = %name, "Deleting file");
                fs::remove_file(&path)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::diff;
    use tempfile::TempDir;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_apply_writes_and_deletes() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "1").unwrap();
        fs::write(temp.path().join("b"), "1").unwrap();

        let current = files(&[("a", "1"), ("b", "1")]);
        let target = files(&[("a", "2"), ("nested/c", "1")]);
        let changes = diff(&current, &target, &[]);

        FsFileApplier.apply(temp.path(), &changes, &target).unwrap();

        assert_eq!(fs::read_to_string(temp.path().join("a")).unwrap(), "2");
        assert_eq!(
            fs::read_to_string(temp.path().join("nested/c")).unwrap(),
            "1"
        );
        assert!(!temp.path().join("b").exists());
    }

    #[test]
    fn test_apply_leaves_conflicts_untouched() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".env"), "SECRET=local").unwrap();

        let current = files(&[(".env", "SECRET=local")]);
        let target = files(&[(".env", "SECRET=template")]);
        let changes = diff(&current, &target, &["*.env".to_string()]);

        FsFileApplier.apply(temp.path(), &changes, &target).unwrap();
        assert_eq!(
            fs::read_to_string(temp.path().join(".env")).unwrap(),
            "SECRET=local"
        );
    }
}
