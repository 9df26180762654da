//! CLI argument parsing tests for neoneo

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

use common::{neoneo, TestEnv, UNREACHABLE_HOST};

#[test]
fn test_help_flag() {
    let mut cmd = neoneo();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Chat with a local Ollama model"))
        .stdout(predicate::str::contains("-m, --model"))
        .stdout(predicate::str::contains("-s, --shell"))
        .stdout(predicate::str::contains("-f, --file-ops"))
        .stdout(predicate::str::contains("--save-config"))
        .stdout(predicate::str::contains("--no-stream"));
}

#[test]
fn test_version_flag() {
    let mut cmd = neoneo();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_unknown_flag_rejected() {
    let mut cmd = neoneo();
    cmd.arg("--frobnicate");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_host_requires_value() {
    let mut cmd = neoneo();
    cmd.arg("--host");
    cmd.assert().failure();
}

// ============================================================================
// Server connection tests
// ============================================================================

#[test]
fn test_unreachable_server_fails() {
    let env = TestEnv::new().unwrap();
    let mut cmd = neoneo();
    cmd.env("HOME", env.home())
        .args(["--no-config", "--host", UNREACHABLE_HOST]);
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("Connecting to Ollama server"))
        .stderr(predicate::str::contains("Could not connect to Ollama server"));
}

#[test]
fn test_list_against_unreachable_server_fails() {
    let env = TestEnv::new().unwrap();
    let mut cmd = neoneo();
    cmd.env("HOME", env.home())
        .args(["--no-config", "-l", "--host", UNREACHABLE_HOST]);
    cmd.assert().failure();
}

#[test]
fn test_bin_path_exists() {
    assert!(common::bin_path().exists());
    let _ = Command::new(common::bin_path()).arg("--help").output().unwrap();
}
