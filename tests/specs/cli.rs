// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI and executor binary smoke tests.

use assert_cmd::Command;

#[test]
fn agor_help_lists_the_surface() {
    let output = Command::cargo_bin("agor").unwrap().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    for command in ["daemon", "db", "user", "worktree", "mcp", "open", "admin"] {
        assert!(stdout.contains(command), "missing {command} in help:\n{stdout}");
    }
}

#[test]
fn agor_daemon_help_shows_logs_flags() {
    let output =
        Command::cargo_bin("agor").unwrap().args(["daemon", "--help"]).assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    assert!(stdout.contains("logs"));
    assert!(stdout.contains("start"));
}

#[test]
fn executor_rejects_malformed_payload() {
    let output = Command::cargo_bin("agor-executor")
        .unwrap()
        .write_stdin("{\"command\": \"rm.rf\", \"params\": {}, \"sessionToken\": \"x\"}\n")
        .assert()
        .failure();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    let result: serde_json::Value =
        serde_json::from_str(stdout.lines().last().unwrap_or("{}")).unwrap();
    assert_eq!(result["success"], false);
    assert_eq!(result["error"]["code"], "validation-failed");
}

#[test]
fn executor_rejects_impersonation_fields() {
    // Impersonation must never be a payload field the executor trusts.
    let payload = serde_json::json!({
        "command": "unix.sync-user",
        "params": {"userId": "u-1"},
        "sessionToken": "x",
        "runAsUser": "root",
    });
    let output = Command::cargo_bin("agor-executor")
        .unwrap()
        .write_stdin(format!("{payload}\n"))
        .assert()
        .failure();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    assert!(stdout.contains("runAsUser"), "unexpected output: {stdout}");
}
