// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use agor_core::{AgenticTool, PermissionMode, SessionId, TaskId};
use agor_wire::{ExecutorAction, PromptParams};
use std::os::unix::fs::PermissionsExt;

fn payload() -> ExecutorPayload {
    ExecutorPayload::new(
        ExecutorAction::Prompt(PromptParams {
            session_id: SessionId::new(),
            task_id: TaskId::new(),
            tool: AgenticTool::ClaudeCode,
            prompt: "hi".into(),
            cwd: "/tmp".into(),
            permission_mode: PermissionMode::Default,
            model: None,
            allowed_tools: Vec::new(),
        }),
        "jwt",
    )
}

fn script_spawner(dir: &std::path::Path, script: &str) -> ProcessSpawner {
    let path = dir.join("fake-executor.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    ProcessSpawner::new(path)
}

#[tokio::test]
async fn captures_result_line_and_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let spawner = script_spawner(
        dir.path(),
        r#"read payload
echo '{"success":true,"data":{"ok":1}}'"#,
    );

    let handle = spawner
        .spawn(SpawnRequest { payload: payload(), run_as: None, sudo_self_as: None })
        .await
        .unwrap();
    let exit = handle.wait().await;

    assert_eq!(exit.code, 0);
    assert!(exit.success());
    assert_eq!(exit.result.unwrap().data.unwrap()["ok"], 1);
}

#[tokio::test]
async fn nonzero_exit_with_stderr_capture() {
    let dir = tempfile::tempdir().unwrap();
    let spawner = script_spawner(
        dir.path(),
        r#"read payload
echo "boom" >&2
exit 7"#,
    );

    let handle = spawner
        .spawn(SpawnRequest { payload: payload(), run_as: None, sudo_self_as: None })
        .await
        .unwrap();
    let exit = handle.wait().await;

    assert_eq!(exit.code, 7);
    assert!(!exit.success());
    assert!(exit.stderr.contains("boom"));
    assert!(exit.result.is_none());
}

#[tokio::test]
async fn cooperative_stop_reaches_stdin() {
    let dir = tempfile::tempdir().unwrap();
    // Echo the stop line back as a (failed) result so we can observe it.
    let spawner = script_spawner(
        dir.path(),
        r#"read payload
read stopline
echo "{\"success\":false,\"error\":{\"code\":\"stopped\",\"message\":\"$stopline\"}}""#,
    );

    let handle = spawner
        .spawn(SpawnRequest { payload: payload(), run_as: None, sudo_self_as: None })
        .await
        .unwrap();
    assert!(handle.send_stop().await);

    let exit = handle.wait().await;
    let error = exit.result.unwrap().error.unwrap();
    assert!(error.message.contains("stop"));
}

#[tokio::test]
async fn sigkill_terminates_a_hung_executor() {
    let dir = tempfile::tempdir().unwrap();
    let spawner = script_spawner(dir.path(), "read payload\nexec sleep 30");

    let handle = spawner
        .spawn(SpawnRequest { payload: payload(), run_as: None, sudo_self_as: None })
        .await
        .unwrap();
    assert!(handle.pid().is_some());
    handle.signal_kill();

    let exit = handle.wait().await;
    assert_ne!(exit.code, 0);
    assert!(handle.try_exited().is_some());
}

#[tokio::test]
async fn missing_binary_is_spawn_failed() {
    let spawner = ProcessSpawner::new("/nonexistent/agor-executor".into());
    let err = spawner
        .spawn(SpawnRequest { payload: payload(), run_as: None, sudo_self_as: None })
        .await
        .unwrap_err();
    assert_eq!(err.kind, agor_core::ErrorKind::ExecutorSpawnFailed);
}

#[test]
fn sudo_wrapping_for_impersonation() {
    let spawner = ProcessSpawner::new("/usr/lib/agor/agor-executor".into());
    let request =
        SpawnRequest { payload: payload(), run_as: Some("alice".into()), sudo_self_as: None };
    let cmd = spawner.command(&request);
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let args: Vec<String> =
        cmd.as_std().get_args().map(|a| a.to_string_lossy().into_owned()).collect();
    assert_eq!(program, "sudo");
    assert_eq!(args[..3], ["-n".to_string(), "-u".into(), "alice".into()]);
}
