//! CLI integration tests
//!
//! End-to-end tests for the modwatch command-line interface. The watch
//! command is exercised through the library in monitor_test.rs since it
//! only ends on Ctrl+C or once every module is gone.

mod common;

use assert_cmd::Command;
use common::TestTree;
use predicates::prelude::*;

/// Get a Command for the modwatch binary
fn modwatch() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("modwatch").expect("Failed to find modwatch binary")
}

fn sample_tree() -> TestTree {
    TestTree::with_files(&[
        ("app/__init__.py", ""),
        ("app/models.py", "import os\n"),
        ("app/views.py", "from app import models\n"),
        (
            "tests/test_views.py",
            "import unittest\nfrom app import views\n\nclass ViewTests(unittest.TestCase):\n    pass\n",
        ),
        ("tests/helpers.py", "from app.models import thing\n"),
    ])
}

#[test]
fn test_help_output() {
    modwatch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Python module dependency graph"));
}

#[test]
fn test_version_output() {
    modwatch()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("modwatch"));
}

#[test]
fn test_graph_prints_descriptions() {
    let tree = sample_tree();
    modwatch()
        .args(["graph", "-s", ".", "-s", "tests"])
        .current_dir(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("app.views: "))
        .stdout(predicate::str::contains("  Dependencies: [app.models]"))
        .stdout(predicate::str::contains("  Reverse: [app.views, helpers]"));
}

#[test]
fn test_graph_json() {
    let tree = sample_tree();
    let output = modwatch()
        .args(["graph", "--json", "--search-path", "."])
        .current_dir(tree.root())
        .output()
        .expect("Failed to run modwatch");
    assert!(output.status.success());

    let units: serde_json::Value = serde_json::from_slice(&output.stdout).expect("Invalid JSON");
    let units = units.as_array().expect("Expected array");
    assert_eq!(units.len(), 5);
    let models = units
        .iter()
        .find(|u| u["name"] == "app.models")
        .expect("app.models missing");
    assert_eq!(models["package"], "app");
    assert!(models["dependencies"].as_array().unwrap().is_empty());
}

#[test]
fn test_affected_lists_reverse_walk() {
    let tree = sample_tree();
    modwatch()
        .args(["affected", "app.models", "-s", ".", "-s", "tests"])
        .current_dir(tree.root())
        .assert()
        .success()
        .stdout("app.models\napp.views\nhelpers\ntest_views\n");
}

#[test]
fn test_affected_tests_only() {
    let tree = sample_tree();
    modwatch()
        .args(["affected", "app.models", "--tests", "--json", "-s", ".", "-s", "tests"])
        .current_dir(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"test_views\""))
        .stdout(predicate::str::contains("helpers").not());
}

#[test]
fn test_affected_unknown_module_fails() {
    let tree = sample_tree();
    modwatch()
        .args(["affected", "nope.missing", "-s", "."])
        .current_dir(tree.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown module: nope.missing"));
}

#[test]
fn test_watch_rejects_bad_interval() {
    let tree = sample_tree();
    modwatch()
        .args(["watch", "--interval", "0"])
        .current_dir(tree.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Poll interval must be positive"));
}

#[test]
fn test_watch_ends_when_nothing_to_watch() {
    let tree = TestTree::new();
    modwatch()
        .args(["watch", "--interval", "0.01", "-q"])
        .current_dir(tree.root())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_project_config_is_applied() {
    let tree = sample_tree();
    tree.write(".modwatch.toml", "search_paths = [\".\", \"tests\"]\n");
    modwatch()
        .args(["affected", "app.views"])
        .current_dir(tree.root())
        .assert()
        .success()
        .stdout("app.views\ntest_views\n");
}
