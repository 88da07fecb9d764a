//! Integration tests for the covrun CLI
//!
//! These tests run the actual binary against temporary tree and config files.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const SCENARIO_TREE: &str = r#"
groups:
  - name: GroupA
    selected: true
    methods:
      - name: m1
      - name: m2
  - name: GroupB
    methods:
      - name: m3
        selected: true
      - name: m4
"#;

const NOTHING_SELECTED_TREE: &str = r#"
groups:
  - name: GroupA
    methods:
      - name: m1
"#;

/// Get the binary to test
fn covrun_cmd() -> Command {
    let mut cmd = Command::cargo_bin("covrun").unwrap();
    cmd.env("RUST_LOG", "off");
    cmd
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_help_flag() {
    covrun_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Run code coverage over the selected tests",
        ));
}

#[test]
fn test_select_prints_resolved_tests_in_order() {
    let dir = TempDir::new().unwrap();
    let tree = write(&dir, "tree.yaml", SCENARIO_TREE);

    covrun_cmd()
        .args(["select", "--tree"])
        .arg(&tree)
        .assert()
        .success()
        .stdout("GroupB.m3\nGroupA.m1\nGroupA.m2\n");
}

#[test]
fn test_select_json() {
    let dir = TempDir::new().unwrap();
    let tree = write(&dir, "tree.yaml", SCENARIO_TREE);

    let output = covrun_cmd()
        .args(["select", "--json", "--tree"])
        .arg(&tree)
        .output()
        .unwrap();
    assert!(output.status.success());

    let names: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(names, vec!["GroupB.m3", "GroupA.m1", "GroupA.m2"]);
}

#[test]
fn test_select_nothing_selected_prints_nothing() {
    let dir = TempDir::new().unwrap();
    let tree = write(&dir, "tree.yaml", NOTHING_SELECTED_TREE);

    covrun_cmd()
        .args(["select", "--tree"])
        .arg(&tree)
        .assert()
        .success()
        .stdout("");
}

#[test]
fn test_validate_summary() {
    let dir = TempDir::new().unwrap();
    let tree = write(&dir, "tree.yaml", SCENARIO_TREE);
    let config = write(
        &dir,
        "covrun.yaml",
        "engine:\n  command: \"echo {{tests}}\"\n",
    );

    covrun_cmd()
        .args(["validate", "--tree"])
        .arg(&tree)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Classes: 2"))
        .stdout(predicate::str::contains("Methods: 4"))
        .stdout(predicate::str::contains("Selected: 3"))
        .stdout(predicate::str::contains("Build: (none)"));
}

#[test]
fn test_validate_rejects_duplicate_group() {
    let dir = TempDir::new().unwrap();
    let tree = write(
        &dir,
        "tree.yaml",
        "groups:\n  - name: A\n  - name: A\n",
    );

    covrun_cmd()
        .args(["validate", "--tree"])
        .arg(&tree)
        .assert()
        .failure()
        .stderr(predicate::str::contains("COV-022"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_validate_missing_file() {
    covrun_cmd()
        .args(["validate", "--tree", "does-not-exist.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_run_collects_coverage() {
    let dir = TempDir::new().unwrap();
    let tree = write(&dir, "tree.yaml", SCENARIO_TREE);
    let results = dir.path().join("coverage.json");
    let config = write(
        &dir,
        "covrun.yaml",
        &format!(
            "build:\n  command: \"true\"\nengine:\n  command: \"echo {{{{tests}}}}\"\nresults_path: {}\n",
            results.display()
        ),
    );

    covrun_cmd()
        .args(["run", "--tree"])
        .arg(&tree)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Please wait"))
        .stdout(predicate::str::contains("'Code Coverage Results'"))
        .stdout(predicate::str::contains("GroupB.m3 GroupA.m1 GroupA.m2"))
        .stdout(predicate::str::contains("Coverage collected for 3 test(s)"));

    let written: String =
        serde_json::from_str(&fs::read_to_string(&results).unwrap()).unwrap();
    assert_eq!(written, "GroupB.m3 GroupA.m1 GroupA.m2");
}

#[test]
fn test_run_fails_when_results_cannot_be_written() {
    let dir = TempDir::new().unwrap();
    let tree = write(&dir, "tree.yaml", SCENARIO_TREE);
    let results = dir.path().join("missing").join("coverage.json");
    let config = write(
        &dir,
        "covrun.yaml",
        &format!(
            "engine:\n  command: \"echo {{{{tests}}}}\"\nresults_path: {}\n",
            results.display()
        ),
    );

    covrun_cmd()
        .args(["run", "--tree"])
        .arg(&tree)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to write coverage results"))
        .stdout(predicate::str::contains("Coverage collected").not());
}

#[test]
fn test_run_with_nothing_selected_fails() {
    let dir = TempDir::new().unwrap();
    let tree = write(&dir, "tree.yaml", NOTHING_SELECTED_TREE);
    let config = write(&dir, "covrun.yaml", "engine:\n  command: \"echo {{tests}}\"\n");

    covrun_cmd()
        .args(["run", "--tree"])
        .arg(&tree)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please select a test to run"));
}

#[test]
fn test_run_with_failed_build_skips_tests() {
    let dir = TempDir::new().unwrap();
    let tree = write(&dir, "tree.yaml", SCENARIO_TREE);
    let config = write(
        &dir,
        "covrun.yaml",
        "build:\n  command: \"echo 'error CS1002' >&2; exit 1\"\nengine:\n  command: \"echo ran {{tests}}\"\n",
    );

    covrun_cmd()
        .args(["run", "--tree"])
        .arg(&tree)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Build failed"))
        .stderr(predicate::str::contains("error CS1002"))
        .stdout(predicate::str::contains("ran GroupB.m3").not());
}

#[test]
fn test_run_with_failing_engine() {
    let dir = TempDir::new().unwrap();
    let tree = write(&dir, "tree.yaml", SCENARIO_TREE);
    let config = write(
        &dir,
        "covrun.yaml",
        "engine:\n  command: \"echo 'profiler not registered' >&2; exit 2 # {{tests}}\"\n",
    );

    covrun_cmd()
        .args(["run", "--tree"])
        .arg(&tree)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Code coverage run failed"))
        .stderr(predicate::str::contains("profiler not registered"));
}

#[test]
fn test_run_empty_tree_is_disabled() {
    let dir = TempDir::new().unwrap();
    let tree = write(&dir, "tree.yaml", "groups: []\n");
    let config = write(&dir, "covrun.yaml", "engine:\n  command: \"echo {{tests}}\"\n");

    covrun_cmd()
        .args(["run", "--tree"])
        .arg(&tree)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("COV-003"));
}

#[test]
fn test_run_log_json() {
    let dir = TempDir::new().unwrap();
    let tree = write(&dir, "tree.yaml", SCENARIO_TREE);
    let config = write(&dir, "covrun.yaml", "engine:\n  command: \"echo {{tests}}\"\n");

    covrun_cmd()
        .args(["run", "--log-json", "--tree"])
        .arg(&tree)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"results_published\""));
}
