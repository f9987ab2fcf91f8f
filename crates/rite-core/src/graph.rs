//! Dependency-cycle detection over composed manifests.
//!
//! A transient adjacency map is built by the caller and owned for the
//! duration of one detection call. Dependency identifiers that are not
//! present in the graph belong to a different validation concern and are
//! skipped here.

use crate::manifest::Manifest;
use rite_common::{Error, Result};
use std::collections::{BTreeMap, HashSet};

/// Adjacency map: manifest identifier -> declared dependency identifiers.
pub type DependencyGraph = BTreeMap<String, Vec<String>>;

/// Build an adjacency map from a set of manifests keyed by name.
pub fn build_graph<'a, I>(manifests: I) -> DependencyGraph
where
    I: IntoIterator<Item = &'a Manifest>,
{
    manifests
        .into_iter()
        .map(|m| (m.name.clone(), m.dependencies.clone()))
        .collect()
}

/// Depth-first cycle search seeded at `start_id`.
///
/// Returns the cycle as an inclusive path whose first and last elements are
/// equal (`[a, b, c, a]` for `a -> b -> c -> a`, `[a, a]` for a direct
/// self-dependency), or `None` when no cycle is reachable from `start_id`.
pub fn detect_cycle(graph: &DependencyGraph, start_id: &str) -> Option<Vec<String>> {
    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();
    let mut path = Vec::new();

    visit(graph, start_id, &mut visited, &mut on_stack, &mut path)
}

fn visit(
    graph: &DependencyGraph,
    id: &str,
    visited: &mut HashSet<String>,
    on_stack: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Option<Vec<String>> {
    let Some(deps) = graph.get(id) else {
        // Unknown identifier: missing-dependency validation happens elsewhere.
        return None;
    };

    visited.insert(id.to_string());
    on_stack.insert(id.to_string());
    path.push(id.to_string());

    for dep in deps {
        if on_stack.contains(dep) {
            let pos = path.iter().position(|p| p == dep).unwrap_or(0);
            let mut cycle: Vec<String> = path[pos..].to_vec();
            cycle.push(dep.clone());
            return Some(cycle);
        }
        if !visited.contains(dep) {
            if let Some(cycle) = visit(graph, dep, visited, on_stack, path) {
                return Some(cycle);
            }
        }
    }

    on_stack.remove(id);
    path.pop();
    None
}

/// Validate that composing `manifest` with the known manifest set stays
/// acyclic.
///
/// The manifest under test is merged into the graph before detection, so a
/// cycle it introduces is caught even before it is persisted anywhere.
pub fn ensure_acyclic(manifest: &Manifest, known: &BTreeMap<String, Manifest>) -> Result<()> {
    let mut graph = build_graph(known.values());
    graph.insert(manifest.name.clone(), manifest.dependencies.clone());

    match detect_cycle(&graph, &manifest.name) {
        Some(path) => Err(Error::DependencyCycle { path }),
        None => Ok(()),
    }
}
