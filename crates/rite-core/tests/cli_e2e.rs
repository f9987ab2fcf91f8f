//! End-to-end CLI tests for the rite binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn rite() -> Command {
    Command::cargo_bin("rite").unwrap()
}

fn write_json(path: &Path, value: serde_json::Value) {
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

fn seed_project(dir: &Path) {
    fs::create_dir_all(dir.join(".rite")).unwrap();
    write_json(
        &dir.join(".rite/state.json"),
        serde_json::json!({
            "ritual_name": "demo",
            "ritual_version": "1.0.0",
        }),
    );
    fs::write(dir.join("a"), "1").unwrap();
}

fn seed_update_inputs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf, std::path::PathBuf) {
    let current_manifest = dir.join("current.json");
    let target_manifest = dir.join("target.json");
    let target_files = dir.join("rendered");

    write_json(
        &current_manifest,
        serde_json::json!({"name": "demo", "version": "1.0.0"}),
    );
    write_json(
        &target_manifest,
        serde_json::json!({"name": "demo", "version": "1.1.0"}),
    );
    fs::create_dir_all(&target_files).unwrap();
    fs::write(target_files.join("a"), "2").unwrap();
    fs::write(target_files.join("b"), "1").unwrap();

    (current_manifest, target_manifest, target_files)
}

#[test]
fn validate_accepts_well_formed_manifest() {
    let temp = TempDir::new().unwrap();
    let manifest = temp.path().join("manifest.json");
    write_json(
        &manifest,
        serde_json::json!({"name": "demo", "version": "1.0.0"}),
    );

    rite()
        .args(["validate", "--manifest"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn validate_rejects_dependency_cycle() {
    let temp = TempDir::new().unwrap();
    let manifest = temp.path().join("manifest.json");
    let base = temp.path().join("base.json");
    write_json(
        &manifest,
        serde_json::json!({"name": "demo", "version": "1.0.0", "dependencies": ["base"]}),
    );
    write_json(
        &base,
        serde_json::json!({"name": "base", "version": "1.0.0", "dependencies": ["demo"]}),
    );

    rite()
        .args(["validate", "--manifest"])
        .arg(&manifest)
        .arg("--known")
        .arg(&base)
        .assert()
        .code(12)
        .stderr(predicate::str::contains("Dependency Cycle"));
}

#[test]
fn plan_reports_changes_as_json() {
    let project = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    seed_project(project.path());
    let (current, target, rendered) = seed_update_inputs(inputs.path());

    rite()
        .arg("-p")
        .arg(project.path())
        .args(["plan", "--current-manifest"])
        .arg(&current)
        .arg("--target-manifest")
        .arg(&target)
        .arg("--target-files")
        .arg(&rendered)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"current_version\": \"1.0.0\""))
        .stdout(predicate::str::contains("\"to_add\""));
}

#[test]
fn update_then_rollback_round_trip() {
    let project = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    seed_project(project.path());
    let (current, target, rendered) = seed_update_inputs(inputs.path());

    rite()
        .arg("-p")
        .arg(project.path())
        .args(["update", "--current-manifest"])
        .arg(&current)
        .arg("--target-manifest")
        .arg(&target)
        .arg("--target-files")
        .arg(&rendered)
        .assert()
        .code(2);

    assert_eq!(
        fs::read_to_string(project.path().join("a")).unwrap(),
        "2"
    );
    assert_eq!(
        fs::read_to_string(project.path().join("b")).unwrap(),
        "1"
    );

    rite()
        .arg("-p")
        .arg(project.path())
        .arg("rollback")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("Restored from"));

    assert_eq!(
        fs::read_to_string(project.path().join("a")).unwrap(),
        "1"
    );
}

#[test]
fn update_dry_run_writes_nothing() {
    let project = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    seed_project(project.path());
    let (current, target, rendered) = seed_update_inputs(inputs.path());

    rite()
        .arg("-p")
        .arg(project.path())
        .args(["update", "--dry-run", "--current-manifest"])
        .arg(&current)
        .arg("--target-manifest")
        .arg(&target)
        .arg("--target-files")
        .arg(&rendered)
        .assert()
        .code(1);

    assert_eq!(fs::read_to_string(project.path().join("a")).unwrap(), "1");
    assert!(!project.path().join("b").exists());
}

#[test]
fn backup_create_and_list() {
    let project = TempDir::new().unwrap();
    seed_project(project.path());

    rite()
        .arg("-p")
        .arg(project.path())
        .args(["backup", "create", "--description", "manual"])
        .assert()
        .success();

    rite()
        .arg("-p")
        .arg(project.path())
        .args(["-f", "text", "backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("backup-"));
}

#[test]
fn checkpoint_create_list_restore() {
    let project = TempDir::new().unwrap();
    seed_project(project.path());

    rite()
        .arg("-p")
        .arg(project.path())
        .args(["checkpoint", "create", "--label", "before-change"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ckpt-"));

    // Mutate state, then restore by label.
    write_json(
        &project.path().join(".rite/state.json"),
        serde_json::json!({
            "ritual_name": "demo",
            "ritual_version": "9.9.9",
        }),
    );

    rite()
        .arg("-p")
        .arg(project.path())
        .args(["checkpoint", "restore", "before-change"])
        .assert()
        .success();

    let state = fs::read_to_string(project.path().join(".rite/state.json")).unwrap();
    assert!(state.contains("1.0.0"));
}

#[test]
fn history_empty_is_clean() {
    let project = TempDir::new().unwrap();
    seed_project(project.path());

    rite()
        .arg("-p")
        .arg(project.path())
        .args(["history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn missing_state_reports_state_error() {
    let project = TempDir::new().unwrap();
    let inputs = TempDir::new().unwrap();
    let (current, target, rendered) = seed_update_inputs(inputs.path());

    rite()
        .arg("-p")
        .arg(project.path())
        .args(["plan", "--current-manifest"])
        .arg(&current)
        .arg("--target-manifest")
        .arg(&target)
        .arg("--target-files")
        .arg(&rendered)
        .assert()
        .code(13)
        .stderr(predicate::str::contains("Project State Not Found"));
}
