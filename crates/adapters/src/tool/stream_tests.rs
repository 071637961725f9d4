// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn parses_json_lines_and_skips_noise() {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(r#"echo '{"n":1}'; echo not-json; echo '{"n":2}'"#);

    let mut seen = Vec::new();
    let outcome = run_jsonl(cmd, None, CancellationToken::new(), |v| {
        seen.push(v["n"].as_u64().unwrap());
    })
    .await
    .unwrap();

    assert!(outcome.success());
    assert!(!outcome.cancelled);
    assert_eq!(seen, vec![1, 2]);
}

#[tokio::test]
async fn missing_binary_is_permanent_failure() {
    let cmd = Command::new("definitely-not-an-agent-cli");
    let err = run_jsonl(cmd, None, CancellationToken::new(), |_| {}).await.unwrap_err();
    assert!(!err.transient);
}

#[tokio::test]
async fn nonzero_exit_is_reported_with_stderr() {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg("echo boom >&2; exit 3");
    let outcome = run_jsonl(cmd, None, CancellationToken::new(), |_| {}).await.unwrap();
    assert_eq!(outcome.exit_code, 3);
    assert!(outcome.stderr.contains("boom"));
}

#[tokio::test]
async fn cancellation_kills_and_drains() {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(r#"echo '{"n":1}'; exec sleep 30"#);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let mut seen = Vec::new();
    let outcome = run_jsonl(cmd, None, cancel, |v| {
        seen.push(v["n"].as_u64().unwrap());
        // First chunk observed — request the stop mid-stream.
        trigger.cancel();
    })
    .await
    .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(seen, vec![1]);
}

#[tokio::test]
async fn stdin_body_is_delivered() {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(r#"read line; echo "{\"echo\":\"$line\"}""#);

    let mut seen = Vec::new();
    let outcome = run_jsonl(cmd, Some(b"hello\n".to_vec()), CancellationToken::new(), |v| {
        seen.push(v["echo"].as_str().unwrap().to_string());
    })
    .await
    .unwrap();

    assert!(outcome.success());
    assert_eq!(seen, vec!["hello"]);
}

#[test]
fn task_handles_cancel_is_idempotent() {
    let handles = TaskHandles::default();
    let session = SessionId::from_string("s-1");
    let task = TaskId::from_string("t-1");

    assert!(!handles.cancel(&session, &task));

    let token = handles.register(&session, &task);
    assert!(handles.cancel(&session, &task));
    assert!(token.is_cancelled());
    // Second cancel still finds the registered (now cancelled) token.
    assert!(handles.cancel(&session, &task));

    handles.remove(&session, &task);
    assert!(!handles.cancel(&session, &task));
}
