// crates/lookup-gate-cli/tests/config_command.rs
// ============================================================================
// Module: CLI Config Command Tests
// Description: Integration tests for the `config` and `serve` commands.
// Purpose: Ensure invalid configuration fails closed with a non-zero exit.
// Dependencies: lookup-gate binary, tempfile
// ============================================================================
//! ## Overview
//! Runs the built `lookup-gate` binary against temporary configuration files
//! and checks exit status and output streams.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn lookup_gate_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_lookup-gate"))
}

fn run(args: &[&str], cwd: &Path) -> Output {
    Command::new(lookup_gate_bin())
        .args(args)
        .current_dir(cwd)
        .env_remove("LOOKUP_GATE_CONFIG")
        .env_remove("LOOKUP_GATE_PROVIDER_BASE_URL")
        .env_remove("LOOKUP_GATE_PROVIDER_API_KEY")
        .env_remove("LOOKUP_GATE_ADMIN_IDS")
        .env_remove("LOOKUP_GATE_BIND")
        .env_remove("LOOKUP_GATE_MAX_INFLIGHT")
        .env_remove("LOOKUP_GATE_LOG_LEVEL")
        .env_remove("LOOKUP_GATE_STORE_PATH")
        .output()
        .expect("run lookup-gate")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn config_example_prints_a_valid_config() {
    let dir = TempDir::new().unwrap();
    let output = run(&["config", "example"], dir.path());
    assert!(output.status.success(), "{}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("[provider]"));

    let path = dir.path().join("example.toml");
    fs::write(&path, text).unwrap();
    let output = run(&["config", "validate", "--config", path.to_str().unwrap()], dir.path());
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("config ok:"));
}

#[test]
fn config_validate_rejects_plain_http_provider() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gate.toml");
    fs::write(&path, "[provider]\nbase_url = \"http://provider.example/index.php\"\n").unwrap();
    let output = run(&["config", "validate", "--config", path.to_str().unwrap()], dir.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("must use https"));
    assert!(stdout(&output).is_empty());
}

#[test]
fn config_validate_fails_for_missing_explicit_path() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");
    let output = run(&["config", "validate", "--config", missing.to_str().unwrap()], dir.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to load config"));
}

#[test]
fn config_validate_without_file_requires_provider_url() {
    let dir = TempDir::new().unwrap();
    let output = run(&["config", "validate"], dir.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("provider.base_url is required"));
}

#[test]
fn config_validate_reads_provider_url_from_environment() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(lookup_gate_bin())
        .args(["config", "validate"])
        .current_dir(dir.path())
        .env_remove("LOOKUP_GATE_CONFIG")
        .env("LOOKUP_GATE_PROVIDER_BASE_URL", "https://provider.example/index.php")
        .output()
        .expect("run lookup-gate");
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("config ok: defaults and environment"));
}

#[test]
fn serve_rejects_public_bind_without_token() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gate.toml");
    fs::write(
        &path,
        "[server]\nbind = \"0.0.0.0:8080\"\n[provider]\nbase_url = \"https://provider.example/index.php\"\n",
    )
    .unwrap();
    let output = run(&["serve", "--config", path.to_str().unwrap()], dir.path());
    assert!(!output.status.success());
    assert!(stderr(&output).contains("requires server.bearer_token"));
}
