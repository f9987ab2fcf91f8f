//! Change-set analysis: compare current and target file contents.
//!
//! Produces a structured change set (added, modified, deleted, unchanged,
//! conflicts) that the planner and file applier consume. Callers supply
//! already-loaded name -> content maps; this module performs no I/O.

use globset::{Glob, GlobMatcher};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Change-set types
// ---------------------------------------------------------------------------

/// Result of comparing two file-content maps.
///
/// Every file name from either input appears in exactly one list. All lists
/// are sorted lexicographically for stable reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeSet {
    /// Present only in the target map.
    pub added: Vec<String>,
    /// Present in both with differing content, not protected.
    pub modified: Vec<String>,
    /// Present only in the current map.
    pub deleted: Vec<String>,
    /// Present in both with identical content.
    pub unchanged: Vec<String>,
    /// Modified files whose name matches a protected pattern.
    pub conflicts: Vec<String>,
}

impl ChangeSet {
    /// True when the update would write no files at all.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.conflicts.is_empty()
    }

    /// Aggregate counts for display.
    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary {
            added: self.added.len(),
            modified: self.modified.len(),
            deleted: self.deleted.len(),
            unchanged: self.unchanged.len(),
            conflicts: self.conflicts.len(),
        }
    }
}

/// Aggregate change statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub conflicts: usize,
}

// ---------------------------------------------------------------------------
// Protected-pattern matching
// ---------------------------------------------------------------------------

/// Compiled protected-file patterns.
///
/// A file is protected when its name matches a pattern exactly, the pattern
/// globs the full name, or the pattern globs the base name (so `*.env`
/// matches `config/.env`).
#[derive(Debug)]
pub struct ProtectedPatterns {
    exact: Vec<String>,
    globs: Vec<GlobMatcher>,
}

impl ProtectedPatterns {
    /// Compile a pattern list. Patterns that fail to compile as globs still
    /// participate in exact matching.
    pub fn compile(patterns: &[String]) -> Self {
        let mut globs = Vec::new();
        for pattern in patterns {
            if let Ok(glob) = Glob::new(pattern) {
                globs.push(glob.compile_matcher());
            }
        }
        Self {
            exact: patterns.to_vec(),
            globs,
        }
    }

    /// True when `name` matches any protected pattern.
    pub fn matches(&self, name: &str) -> bool {
        if self.exact.iter().any(|p| p == name) {
            return true;
        }
        let base = Path::new(name)
            .file_name()
            .map(|b| b.to_string_lossy().to_string());
        self.globs.iter().any(|g| {
            g.is_match(name) || base.as_deref().map(|b| g.is_match(b)).unwrap_or(false)
        })
    }
}

// ---------------------------------------------------------------------------
// Core diff algorithm
// ---------------------------------------------------------------------------

/// Compare two name -> content maps under a set of protected patterns.
pub fn diff(
    current_files: &BTreeMap<String, String>,
    target_files: &BTreeMap<String, String>,
    protected_patterns: &[String],
) -> ChangeSet {
    let protected = ProtectedPatterns::compile(protected_patterns);
    let mut changes = ChangeSet::default();

    for (name, target_content) in target_files {
        match current_files.get(name) {
            None => changes.added.push(name.clone()),
            Some(current_content) if current_content != target_content => {
                if protected.matches(name) {
                    changes.conflicts.push(name.clone());
                } else {
                    changes.modified.push(name.clone());
                }
            }
            Some(_) => changes.unchanged.push(name.clone()),
        }
    }

    for name in current_files.keys() {
        if !target_files.contains_key(name) {
            changes.deleted.push(name.clone());
        }
    }

    // BTreeMap iteration is already ordered; sort anyway so the invariant
    // does not depend on the input map type.
    changes.added.sort();
    changes.modified.sort();
    changes.deleted.sort();
    changes.unchanged.sort();
    changes.conflicts.sort();

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_basic_classification() {
        let current = files(&[("a", "1"), ("b", "1")]);
        let target = files(&[("a", "2"), ("c", "1")]);

        let changes = diff(&current, &target, &[]);
        assert_eq!(changes.added, vec!["c"]);
        assert_eq!(changes.modified, vec!["a"]);
        assert_eq!(changes.deleted, vec!["b"]);
        assert!(changes.unchanged.is_empty());
        assert!(changes.conflicts.is_empty());
    }

    #[test]
    fn test_protected_moves_modified_to_conflicts() {
        let current = files(&[("a", "1"), ("b", "1")]);
        let target = files(&[("a", "2"), ("c", "1")]);

        let changes = diff(&current, &target, &["a".to_string()]);
        assert!(changes.modified.is_empty());
        assert_eq!(changes.conflicts, vec!["a"]);
    }

    #[test]
    fn test_protected_glob_matches_basename() {
        let current = files(&[("config/.env", "SECRET=1")]);
        let target = files(&[("config/.env", "SECRET=2")]);

        let changes = diff(&current, &target, &["*.env".to_string()]);
        assert_eq!(changes.conflicts, vec!["config/.env"]);
    }

    #[test]
    fn test_protected_only_applies_to_modified() {
        // Protected files that are added or unchanged are not conflicts.
        let current = files(&[("keep.env", "same")]);
        let target = files(&[("keep.env", "same"), ("new.env", "x")]);

        let changes = diff(&current, &target, &["*.env".to_string()]);
        assert_eq!(changes.added, vec!["new.env"]);
        assert_eq!(changes.unchanged, vec!["keep.env"]);
        assert!(changes.conflicts.is_empty());
    }

    #[test]
    fn test_invalid_glob_still_matches_exactly() {
        let current = files(&[("weird[", "1")]);
        let target = files(&[("weird[", "2")]);

        let changes = diff(&current, &target, &["weird[".to_string()]);
        assert_eq!(changes.conflicts, vec!["weird["]);
    }

    #[test]
    fn test_summary_counts() {
        let current = files(&[("a", "1"), ("b", "1"), ("c", "1")]);
        let target = files(&[("a", "2"), ("b", "1"), ("d", "1")]);

        let summary = diff(&current, &target, &[]).summary();
        assert_eq!(
            summary,
            ChangeSummary {
                added: 1,
                modified: 1,
                deleted: 1,
                unchanged: 1,
                conflicts: 0
            }
        );
    }

    proptest! {
        /// Every key of the union of both maps lands in exactly one list.
        #[test]
        fn prop_partition_is_exact(
            current in prop::collection::btree_map("[a-d]{1,3}", "[01]{1,2}", 0..8),
            target in prop::collection::btree_map("[a-d]{1,3}", "[01]{1,2}", 0..8),
            protected in prop::collection::vec("[a-d]{1,3}", 0..3),
        ) {
            let changes = diff(&current, &target, &protected);

            let mut seen: Vec<&String> = changes.added.iter()
                .chain(&changes.modified)
                .chain(&changes.deleted)
                .chain(&changes.unchanged)
                .chain(&changes.conflicts)
                .collect();
            seen.sort();
            seen.dedup();

            let mut union: Vec<&String> = current.keys().chain(target.keys()).collect();
            union.sort();
            union.dedup();

            prop_assert_eq!(seen.len(),
                changes.added.len() + changes.modified.len() + changes.deleted.len()
                    + changes.unchanged.len() + changes.conflicts.len());
            prop_assert_eq!(seen, union);
        }
    }
}
