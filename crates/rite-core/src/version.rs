//! Version classification between project and template versions.
//!
//! Pure functions over parsed semantic versions. Malformed version strings
//! fail at the `parse_version` boundary; everything past it is total.

use rite_common::{Error, Result};
use semver::Version;
use serde::Serialize;

/// Parse a semantic version string, mapping failures to [`Error::Parse`].
///
/// This is the boundary where malformed versions are rejected; the
/// classification functions below assume already-valid versions.
pub fn parse_version(input: &str) -> Result<Version> {
    Version::parse(input.trim()).map_err(|e| Error::Parse {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// The highest-order version component that increased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Patch,
    Minor,
    Major,
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateKind::Patch => write!(f, "patch"),
            UpdateKind::Minor => write!(f, "minor"),
            UpdateKind::Major => write!(f, "major"),
        }
    }
}

/// Classification of a version transition.
#[derive(Debug, Clone, Serialize)]
pub struct VersionChange {
    pub from: Version,
    pub to: Version,
    pub kind: UpdateKind,
    pub breaking: bool,
}

/// True when `candidate` is strictly greater than `current`.
pub fn is_update_available(current: &Version, candidate: &Version) -> bool {
    candidate > current
}

/// True when `candidate`'s major component exceeds `current`'s.
pub fn is_breaking(current: &Version, candidate: &Version) -> bool {
    candidate.major > current.major
}

/// Classify the transition from `current` to `target`.
///
/// The kind is the highest-order component that increased; identical
/// versions classify as a patch-level, non-breaking change.
pub fn classify(current: &Version, target: &Version) -> VersionChange {
    let kind = if target.major > current.major {
        UpdateKind::Major
    } else if target.major == current.major && target.minor > current.minor {
        UpdateKind::Minor
    } else {
        UpdateKind::Patch
    };

    VersionChange {
        from: current.clone(),
        to: target.clone(),
        kind,
        breaking: is_breaking(current, target),
    }
}

/// All candidates strictly greater than `current`, sorted descending.
pub fn list_updates(current: &Version, candidates: &[Version]) -> Vec<Version> {
    let mut updates: Vec<Version> = candidates
        .iter()
        .filter(|c| is_update_available(current, c))
        .cloned()
        .collect();
    updates.sort_by(|a, b| b.cmp(a));
    updates
}

/// The greatest candidate greater than `current` that is not breaking.
pub fn latest_compatible(current: &Version, candidates: &[Version]) -> Option<Version> {
    list_updates(current, candidates)
        .into_iter()
        .find(|c| !is_breaking(current, c))
}
