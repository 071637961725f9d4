// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn runs_a_command_to_completion() {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg("echo hi");
    let output = run_with_timeout(cmd, INSPECT_TIMEOUT, "echo").await.unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hi");
}

#[tokio::test]
async fn timeout_kills_the_command() {
    let mut cmd = Command::new("sleep");
    cmd.arg("30");
    let err = run_with_timeout(cmd, Duration::from_millis(50), "sleep").await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
}

#[tokio::test]
async fn stdin_is_delivered() {
    let output =
        run_with_stdin(Command::new("cat"), b"secret\n", INSPECT_TIMEOUT, "cat").await.unwrap();
    assert_eq!(String::from_utf8_lossy(&output.stdout), "secret\n");
}

#[tokio::test]
async fn stderr_summary_truncates() {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg("head -c 2000 /dev/zero | tr '\\0' 'x' >&2");
    let output = run_with_timeout(cmd, INSPECT_TIMEOUT, "noise").await.unwrap();
    let summary = stderr_summary(&output);
    assert!(summary.len() < 600);
    assert!(summary.ends_with('…'));
}
