//! Exit codes for the rite CLI.
//!
//! Exit codes communicate operation outcome without requiring output
//! parsing, and are a stable contract for automation.
//!
//! Ranges:
//! - 0-6: Success/operational outcomes
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors

use rite_common::error::{Error, ErrorCategory};

/// Exit codes for rite operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success: operation completed cleanly
    Clean = 0,

    /// Plan produced; nothing executed
    PlanReady = 1,

    /// Update executed and persisted
    Updated = 2,

    /// Update failed; project restored from backup
    RolledBack = 3,

    /// Update failed and rollback also failed
    RollbackFailed = 4,

    /// Plan has conflicts requiring manual intervention
    ConflictsFound = 5,

    /// Invalid arguments
    ArgsError = 10,

    /// Malformed version string
    ParseError = 11,

    /// Manifest or migration validation failed
    ValidationError = 12,

    /// Project state missing or corrupted
    StateError = 13,

    /// Backup or checkpoint operation failed
    RecoveryError = 14,

    /// Migration execution failed (no rollback attempted)
    MigrationError = 15,

    /// I/O failure
    IoError = 16,

    /// Handler kind the engine declines to execute
    NotImplementedError = 17,

    /// Unexpected internal error
    InternalError = 20,
}

impl ExitCode {
    /// Map an engine error to its exit code.
    pub fn from_error(err: &Error) -> Self {
        match err.category() {
            ErrorCategory::Parse => ExitCode::ParseError,
            ErrorCategory::Validation => ExitCode::ValidationError,
            ErrorCategory::Migration => ExitCode::MigrationError,
            ErrorCategory::Recovery => ExitCode::RecoveryError,
            ErrorCategory::State => ExitCode::StateError,
            ErrorCategory::Io => ExitCode::IoError,
            ErrorCategory::NotImplemented => ExitCode::NotImplementedError,
        }
    }

    /// Terminate the process with this code.
    pub fn exit(self) -> ! {
        std::process::exit(self as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err = Error::Parse {
            input: "x".into(),
            reason: "bad".into(),
        };
        assert_eq!(ExitCode::from_error(&err), ExitCode::ParseError);

        let err = Error::NotImplemented("sql".into());
        assert_eq!(ExitCode::from_error(&err), ExitCode::NotImplementedError);
    }

    #[test]
    fn test_code_values_stable() {
        assert_eq!(ExitCode::Clean as i32, 0);
        assert_eq!(ExitCode::RolledBack as i32, 3);
        assert_eq!(ExitCode::ArgsError as i32, 10);
        assert_eq!(ExitCode::InternalError as i32, 20);
    }
}
