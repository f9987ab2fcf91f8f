//! Error types for rite.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! Errors can be formatted for human consumption with headline, reason, and fix:
//! ```text
//! ✗ Migration Failed
//!   Reason: migration 1.0.0 -> 1.1.0 failed: script exited with status 1
//!   Fix: Inspect the migration script output, then retry. The project was restored from backup.
//! ```
//!
//! # Agent-Facing Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 30,
//!   "category": "migration",
//!   "message": "migration 1.0.0 -> 1.1.0 failed: script exited with status 1",
//!   "recoverable": true,
//!   "context": { "from_version": "1.0.0", "to_version": "1.1.0" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rite operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Version string parsing errors.
    Parse,
    /// Manifest and migration structure validation errors.
    Validation,
    /// Migration execution errors.
    Migration,
    /// Backup and checkpoint errors.
    Recovery,
    /// Project state errors.
    State,
    /// File I/O and serialization errors.
    Io,
    /// Handler kinds this engine declines to execute.
    NotImplemented,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Parse => write!(f, "parse"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Migration => write!(f, "migration"),
            ErrorCategory::Recovery => write!(f, "recovery"),
            ErrorCategory::State => write!(f, "state"),
            ErrorCategory::Io => write!(f, "io"),
            ErrorCategory::NotImplemented => write!(f, "not_implemented"),
        }
    }
}

/// Unified error type for rite.
#[derive(Error, Debug)]
pub enum Error {
    // Parse errors (10-19)
    #[error("invalid semantic version '{input}': {reason}")]
    Parse { input: String, reason: String },

    // Validation errors (20-29)
    #[error("dependency cycle detected: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error("migration {from_version} -> {to_version} has no up handler")]
    MissingUpHandler {
        from_version: String,
        to_version: String,
    },

    #[error("non-idempotent migration {from_version} -> {to_version} has no down handler")]
    MissingDownHandler {
        from_version: String,
        to_version: String,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    // Migration errors (30-39)
    #[error("migration {from_version} -> {to_version} failed: {reason}")]
    MigrationFailed {
        from_version: String,
        to_version: String,
        reason: String,
    },

    #[error("migration script not found: {path}")]
    ScriptNotFound { path: PathBuf },

    #[error("migration declares an empty SQL statement")]
    EmptySqlStatement,

    #[error("hook '{name}' failed: {reason}")]
    HookFailed { name: String, reason: String },

    #[error("unknown hook: {name}")]
    UnknownHook { name: String },

    // Recovery errors (40-49)
    #[error("backup not found: {path}")]
    BackupNotFound { path: PathBuf },

    #[error("checkpoint not found: {id}")]
    CheckpointNotFound { id: String },

    #[error("restore failed: {0}")]
    RestoreFailed(String),

    // State errors (50-59)
    #[error("project state not found: {path}")]
    StateNotFound { path: PathBuf },

    #[error("project state corrupted: {0}")]
    StateCorrupted(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Not-implemented handler kinds (70-79)
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Parse errors
    /// - 20-29: Validation errors
    /// - 30-39: Migration errors
    /// - 40-49: Recovery errors
    /// - 50-59: State errors
    /// - 60-69: I/O errors
    /// - 70-79: Not-implemented handler kinds
    pub fn code(&self) -> u32 {
        match self {
            Error::Parse { .. } => 10,
            Error::DependencyCycle { .. } => 20,
            Error::MissingUpHandler { .. } => 21,
            Error::MissingDownHandler { .. } => 22,
            Error::Validation(_) => 23,
            Error::MigrationFailed { .. } => 30,
            Error::ScriptNotFound { .. } => 31,
            Error::EmptySqlStatement => 32,
            Error::HookFailed { .. } => 33,
            Error::UnknownHook { .. } => 34,
            Error::BackupNotFound { .. } => 40,
            Error::CheckpointNotFound { .. } => 41,
            Error::RestoreFailed(_) => 42,
            Error::StateNotFound { .. } => 50,
            Error::StateCorrupted(_) => 51,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::NotImplemented(_) => 70,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Parse { .. } => ErrorCategory::Parse,

            Error::DependencyCycle { .. }
            | Error::MissingUpHandler { .. }
            | Error::MissingDownHandler { .. }
            | Error::Validation(_) => ErrorCategory::Validation,

            Error::MigrationFailed { .. }
            | Error::ScriptNotFound { .. }
            | Error::EmptySqlStatement
            | Error::HookFailed { .. }
            | Error::UnknownHook { .. } => ErrorCategory::Migration,

            Error::BackupNotFound { .. }
            | Error::CheckpointNotFound { .. }
            | Error::RestoreFailed(_) => ErrorCategory::Recovery,

            Error::StateNotFound { .. } | Error::StateCorrupted(_) => ErrorCategory::State,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,

            Error::NotImplemented(_) => ErrorCategory::NotImplemented,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Parse: recoverable by fixing the version string
            Error::Parse { .. } => true,

            // Validation: recoverable by fixing the manifest
            Error::DependencyCycle { .. } => true,
            Error::MissingUpHandler { .. } => true,
            Error::MissingDownHandler { .. } => true,
            Error::Validation(_) => true,

            // Migration: retry possible after fixing the handler
            Error::MigrationFailed { .. } => true,
            Error::ScriptNotFound { .. } => true,
            Error::EmptySqlStatement => true,
            Error::HookFailed { .. } => true,
            Error::UnknownHook { .. } => true,

            // Recovery: a missing backup is gone
            Error::BackupNotFound { .. } => false,
            Error::CheckpointNotFound { .. } => false,
            Error::RestoreFailed(_) => false,

            // State: can be reinitialized
            Error::StateNotFound { .. } => true,
            Error::StateCorrupted(_) => true,

            // I/O: often transient
            Error::Io(_) => true,
            Error::Json(_) => true,

            // Not implemented at runtime
            Error::NotImplemented(_) => false,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Parse { .. } => {
                "Versions must follow semantic versioning (major.minor.patch). Fix the version string in the manifest or project state."
            }
            Error::DependencyCycle { .. } => {
                "Remove one of the dependencies in the reported cycle from the manifest chain."
            }
            Error::MissingUpHandler { .. } => {
                "Every migration needs exactly one of: SQL statements, a script path, or a code reference for 'up'."
            }
            Error::MissingDownHandler { .. } => {
                "Add a down handler, or mark the migration idempotent if it is safe to re-run."
            }
            Error::Validation(_) => {
                "Run 'rite validate' against the manifest and fix the reported issues."
            }
            Error::MigrationFailed { .. } => {
                "Inspect the migration script output, then retry. The project was restored from backup unless --force was given."
            }
            Error::ScriptNotFound { .. } => {
                "Migration script paths resolve relative to the project root. Check the path in the manifest."
            }
            Error::EmptySqlStatement => {
                "Remove empty statements from the migration's SQL list."
            }
            Error::HookFailed { .. } => {
                "Post-update hooks are optional; the update completed. Inspect the hook output and re-run it manually."
            }
            Error::UnknownHook { .. } => {
                "The manifest names a hook that is not registered. Check the hook name or register it."
            }
            Error::BackupNotFound { .. } => {
                "List available backups with 'rite backup list' and use a path from that output."
            }
            Error::CheckpointNotFound { .. } => {
                "List checkpoints with 'rite checkpoint list' and use an id or label from that output."
            }
            Error::RestoreFailed(_) => {
                "Restoration is safe to re-run. Check disk space and permissions, then retry the restore."
            }
            Error::StateNotFound { .. } => {
                "The project has no rite state. Was it scaffolded by rite? Initialize state before updating."
            }
            Error::StateCorrupted(_) => {
                "Restore state from a checkpoint with 'rite checkpoint restore', or from a full backup."
            }
            Error::Io(_) => {
                "Check disk space, permissions, and that the project directory exists. Retry the operation."
            }
            Error::Json(_) => {
                "Invalid JSON in a persisted file. Check syntax, or restore from a backup."
            }
            Error::NotImplemented(_) => {
                "This migration handler kind is not executed by the engine. Use a script handler instead."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Parse { .. } => "Invalid Version",
            Error::DependencyCycle { .. } => "Dependency Cycle",
            Error::MissingUpHandler { .. } => "Migration Missing Up Handler",
            Error::MissingDownHandler { .. } => "Migration Missing Down Handler",
            Error::Validation(_) => "Validation Failed",
            Error::MigrationFailed { .. } => "Migration Failed",
            Error::ScriptNotFound { .. } => "Migration Script Not Found",
            Error::EmptySqlStatement => "Empty SQL Statement",
            Error::HookFailed { .. } => "Hook Failed",
            Error::UnknownHook { .. } => "Unknown Hook",
            Error::BackupNotFound { .. } => "Backup Not Found",
            Error::CheckpointNotFound { .. } => "Checkpoint Not Found",
            Error::RestoreFailed(_) => "Restore Failed",
            Error::StateNotFound { .. } => "Project State Not Found",
            Error::StateCorrupted(_) => "Project State Corrupted",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
            Error::NotImplemented(_) => "Not Implemented",
        }
    }
}

/// Structured error response for JSON output.
///
/// Used by agent/robot modes for machine-parseable error reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context (e.g., versions, paths).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::Parse { input, .. } => {
                context.insert("input".to_string(), serde_json::json!(input));
            }
            Error::DependencyCycle { path } => {
                context.insert("cycle".to_string(), serde_json::json!(path));
            }
            Error::MigrationFailed {
                from_version,
                to_version,
                ..
            }
            | Error::MissingUpHandler {
                from_version,
                to_version,
            }
            | Error::MissingDownHandler {
                from_version,
                to_version,
            } => {
                context.insert("from_version".to_string(), serde_json::json!(from_version));
                context.insert("to_version".to_string(), serde_json::json!(to_version));
            }
            Error::ScriptNotFound { path } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            Error::BackupNotFound { path } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            Error::CheckpointNotFound { id } => {
                context.insert("id".to_string(), serde_json::json!(id));
            }
            Error::HookFailed { name, .. } | Error::UnknownHook { name } => {
                context.insert("hook".to_string(), serde_json::json!(name));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            Error::Parse {
                input: "abc".into(),
                reason: "bad".into()
            }
            .code(),
            10
        );
        assert_eq!(
            Error::DependencyCycle {
                path: vec!["a".into(), "a".into()]
            }
            .code(),
            20
        );
        assert_eq!(Error::NotImplemented("sql".into()).code(), 70);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            Error::MigrationFailed {
                from_version: "1.0.0".into(),
                to_version: "1.1.0".into(),
                reason: "boom".into()
            }
            .category(),
            ErrorCategory::Migration
        );
        assert_eq!(
            Error::BackupNotFound {
                path: PathBuf::from("/nope")
            }
            .category(),
            ErrorCategory::Recovery
        );
    }

    #[test]
    fn test_error_recoverable() {
        assert!(Error::Validation("bad".into()).is_recoverable());
        assert!(!Error::BackupNotFound {
            path: PathBuf::from("/nope")
        }
        .is_recoverable());
        assert!(!Error::NotImplemented("code migration".into()).is_recoverable());
    }

    #[test]
    fn test_structured_error_from_error() {
        let err = Error::MigrationFailed {
            from_version: "1.0.0".into(),
            to_version: "1.1.0".into(),
            reason: "script exited with status 1".into(),
        };
        let structured = StructuredError::from(&err);

        assert_eq!(structured.code, 30);
        assert_eq!(structured.category, ErrorCategory::Migration);
        assert!(structured.recoverable);
        assert_eq!(
            structured.context.get("from_version"),
            Some(&serde_json::json!("1.0.0"))
        );
    }

    #[test]
    fn test_structured_error_json() {
        let err = Error::DependencyCycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        let json = StructuredError::from(&err).to_json();

        assert!(json.contains(r#""code":20"#));
        assert!(json.contains(r#""category":"validation""#));
        assert!(json.contains(r#""recoverable":true"#));
    }

    #[test]
    fn test_format_error_human() {
        let err = Error::EmptySqlStatement;
        let formatted = format_error_human(&err, false);

        assert!(formatted.contains("Empty SQL Statement"));
        assert!(formatted.contains("empty SQL statement"));
        assert!(formatted.contains("Fix:"));
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Parse.to_string(), "parse");
        assert_eq!(ErrorCategory::NotImplemented.to_string(), "not_implemented");
    }
}
