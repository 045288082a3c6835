//! Integration tests for the automaton-sandbox CLI.
//!
//! These tests verify the CLI binary behavior by running the actual executable
//! and checking output and exit codes. Nothing here talks to a real sandbox.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

// -----------------------------------------------------------------------------
// Test helpers
// -----------------------------------------------------------------------------

/// Creates a Command for the automaton-sandbox binary.
#[allow(deprecated)]
fn automaton_sandbox() -> Command {
    let mut cmd =
        Command::cargo_bin("automaton-sandbox").expect("failed to find automaton-sandbox binary");
    cmd.env_remove("CONWAY_API_KEY").env_remove("RUST_LOG");
    cmd
}

/// Writes a config file into `dir` and returns its path as a string.
fn write_config(dir: &TempDir, content: &str) -> String {
    let path = dir.path().join("sandbox.toml");
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

// -----------------------------------------------------------------------------
// Help and version tests
// -----------------------------------------------------------------------------

#[test]
fn test_help_shows_all_commands() {
    automaton_sandbox()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ensure"))
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("init-repo"))
        .stdout(predicate::str::contains("commit"))
        .stdout(predicate::str::contains("skill"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("resolve"));
}

#[test]
fn test_version_shows_version() {
    automaton_sandbox()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("automaton-sandbox"));
}

#[test]
fn test_commit_help_lists_categories() {
    automaton_sandbox()
        .args(["commit", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--category"))
        .stdout(predicate::str::contains("soul"))
        .stdout(predicate::str::contains("heartbeat"));
}

#[test]
fn test_skill_help_lists_actions() {
    automaton_sandbox()
        .args(["skill", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("remove"))
        .stdout(predicate::str::contains("update"));
}

// -----------------------------------------------------------------------------
// Argument validation tests
// -----------------------------------------------------------------------------

#[test]
fn test_commit_accepts_free_form_category() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "[sandbox]\nbackend = \"conway\"\n");

    // Parsing succeeds; the run stops at the missing credentials.
    automaton_sandbox()
        .args(["--config", &config, "commit", "changed things", "--category", "memory"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value").not())
        .stderr(predicate::str::contains("CONWAY_API_KEY"));
}

#[test]
fn test_commit_rejects_empty_category() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");

    automaton_sandbox()
        .args(["--config", &config, "commit", "changed things", "--category", " "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Category cannot be empty"));
}

#[test]
fn test_skill_rejects_unknown_action() {
    automaton_sandbox()
        .args(["skill", "research", "delete"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// -----------------------------------------------------------------------------
// Resolve command tests
// -----------------------------------------------------------------------------

#[test]
fn test_resolve_tilde_path() {
    automaton_sandbox()
        .args(["resolve", "~/a/./b/../c.txt"])
        .assert()
        .success()
        .stdout("/root/a/c.txt\n");
}

#[test]
fn test_resolve_relative_and_absolute_paths() {
    automaton_sandbox()
        .args(["resolve", "notes/todo.md"])
        .assert()
        .success()
        .stdout("/root/notes/todo.md\n");

    automaton_sandbox()
        .args(["resolve", "/var/log/app.log"])
        .assert()
        .success()
        .stdout("/var/log/app.log\n");
}

// -----------------------------------------------------------------------------
// Configuration tests
// -----------------------------------------------------------------------------

#[test]
fn test_conway_backend_requires_api_key() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "[sandbox]\nbackend = \"conway\"\n");

    automaton_sandbox()
        .args(["--config", &config, "ensure"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONWAY_API_KEY"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "[sandbox]\nbackend = \"firecracker\"\n");

    automaton_sandbox()
        .args(["--config", &config, "ensure"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_commit_rejects_empty_description() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");

    automaton_sandbox()
        .args(["--config", &config, "commit", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Description cannot be empty"));
}
