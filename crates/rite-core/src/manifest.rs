//! Parsed ritual manifest data consumed by the engine.
//!
//! The engine never parses the ritual manifest format itself; a loader
//! (outside this crate) supplies this already-parsed shape with exactly the
//! fields the engine reads.

use crate::migrate::MigrationDefinition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A versioned project template ("ritual") definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Ritual name; also the manifest's identifier in dependency graphs.
    pub name: String,

    /// Ritual version string (semantic version).
    pub version: String,

    /// File template mappings: source -> destination.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, String>,

    /// Exact names or glob patterns that must not be silently overwritten.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protected_files: Vec<String>,

    /// Declared migrations, in the order they must run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub migrations: Vec<MigrationDefinition>,

    /// Identifiers of rituals this one composes with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Names of post-update hooks to run, resolved via the hook registry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_update_hooks: Vec<String>,
}

impl Manifest {
    /// Create a minimal manifest with the given name and version.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            templates: BTreeMap::new(),
            protected_files: Vec::new(),
            migrations: Vec::new(),
            dependencies: Vec::new(),
            post_update_hooks: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_migrations(mut self, migrations: Vec<MigrationDefinition>) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn with_protected_files(mut self, protected_files: Vec<String>) -> Self {
        self.protected_files = protected_files;
        self
    }

    pub fn with_post_update_hooks(mut self, hooks: Vec<String>) -> Self {
        self.post_update_hooks = hooks;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_json_roundtrip() {
        let manifest = Manifest::new("rust-service", "1.2.0")
            .with_dependencies(vec!["base".to_string()])
            .with_protected_files(vec!["*.env".to_string()]);

        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "rust-service");
        assert_eq!(back.version, "1.2.0");
        assert_eq!(back.dependencies, vec!["base"]);
        assert_eq!(back.protected_files, vec!["*.env"]);
    }

    #[test]
    fn test_manifest_defaults_omitted_fields() {
        let manifest: Manifest =
            serde_json::from_str(r#"{"name": "minimal", "version": "0.1.0"}"#).unwrap();
        assert!(manifest.migrations.is_empty());
        assert!(manifest.post_update_hooks.is_empty());
    }
}
