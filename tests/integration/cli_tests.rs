//! Integration tests for the CLI binary.
//!
//! This test is registered as a [[test]] in the zid-cache-cli crate
//! so that CARGO_BIN_EXE_zidc is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `zidc` binary.
fn zidc_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_zidc"))
}

fn run(cache: &Path, args: &[&str]) -> Output {
    zidc_binary()
        .arg("--cache")
        .arg(cache)
        .arg("--no-sync")
        .args(args)
        .output()
        .expect("failed to execute zidc")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

const PEER: &str = "0102030405060708090a0b0c";

#[test]
fn cli_responds_to_help() {
    let output = zidc_binary()
        .arg("--help")
        .output()
        .expect("failed to execute zidc --help");

    assert!(
        output.status.success(),
        "zidc --help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let out = stdout(&output);
    assert!(
        out.contains("zidc") || out.contains("Usage"),
        "zidc --help output should contain usage information, got: {out}"
    );
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = zidc_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute zidc");

    assert!(!output.status.success());
}

#[test]
fn cli_init_then_show_json() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("zid.cache");

    let init = run(&cache, &["init"]);
    assert!(init.status.success(), "init failed: {init:?}");
    assert!(stdout(&init).contains("Created ZID cache"));
    assert!(cache.exists());

    let show = run(&cache, &["show", "--json"]);
    assert!(show.status.success(), "show failed: {show:?}");
    let summary: serde_json::Value = serde_json::from_str(&stdout(&show)).unwrap();
    assert_eq!(summary["peers"], 0);
    assert_eq!(summary["own_zid"].as_str().unwrap().len(), 24);
}

#[test]
fn cli_show_without_cache_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("missing.cache");

    let output = run(&cache, &["show"]);
    assert!(!output.status.success());
    assert!(!cache.exists(), "show must not create a cache");
}

#[test]
fn cli_verify_and_retain_persist() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("zid.cache");
    assert!(run(&cache, &["init"]).status.success());

    assert!(run(&cache, &["verify", PEER]).status.success());
    let secret = "ab".repeat(32);
    assert!(run(&cache, &["retain", PEER, "--secret", &secret])
        .status
        .success());

    let list = run(&cache, &["list", "--json"]);
    assert!(list.status.success());
    let peers: serde_json::Value = serde_json::from_str(&stdout(&list)).unwrap();
    let peers = peers.as_array().unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0]["zid"], PEER);
    assert_eq!(peers[0]["sas_verified"], true);
    assert_eq!(peers[0]["rs1_valid"], true);
    assert_eq!(peers[0]["rs1_expires"], "never");
    assert!(!stdout(&list).contains(&secret), "secrets must not be printed");

    assert!(run(&cache, &["unverify", PEER]).status.success());
    let list = run(&cache, &["list", "--json"]);
    let peers: serde_json::Value = serde_json::from_str(&stdout(&list)).unwrap();
    assert_eq!(peers[0]["sas_verified"], false);
}

#[test]
fn cli_rejects_malformed_zid() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("zid.cache");
    assert!(run(&cache, &["init"]).status.success());

    let output = run(&cache, &["lookup", "xyz"]);
    assert!(!output.status.success());
}
