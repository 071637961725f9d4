// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_helpers::{fixture, wait_for};
use agor_core::{
    ErrorKind, Event, Message, PermissionMode, Session, SessionStatus, Task, TaskStatus,
};
use agor_wire::ExecutorAction;

#[tokio::test]
async fn pipeline_creates_task_message_and_spawn() {
    let fx = fixture();
    let task = fx.engine.prompt(fx.session.session_id.as_str(), "write hello.txt", None).await.unwrap();

    assert_eq!(task.status, TaskStatus::Running);
    assert_eq!(task.description, "write hello.txt");
    // Steps 1-3 durable: task row, session task list, user message.
    let session: Session = fx.engine.store.get(fx.session.session_id.as_str()).unwrap();
    assert_eq!(session.tasks, vec![task.task_id.clone()]);
    assert_eq!(session.message_count, 1);
    assert_eq!(session.status, SessionStatus::Running);

    let messages: Vec<Message> = fx.engine.store.all();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].task_id, task.task_id);

    // Spawn carried the tool payload with the session's cwd.
    let request = fx.spawner.last_request();
    match request.payload.action {
        ExecutorAction::Prompt(params) => {
            assert_eq!(params.prompt, "write hello.txt");
            assert_eq!(params.cwd, fx.worktree.path);
            assert_eq!(params.permission_mode, PermissionMode::Default);
        }
        other => panic!("expected prompt payload, got {other:?}"),
    }
    assert!(request.payload.session_token.starts_with("test-token:"));
}

#[tokio::test]
async fn busy_gate_rejects_second_prompt() {
    let fx = fixture();
    fx.engine.prompt(fx.session.session_id.as_str(), "first", None).await.unwrap();

    let err = fx.engine.prompt(fx.session.session_id.as_str(), "second", None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::SessionBusy);

    // Only one task exists.
    let session: Session = fx.engine.store.get(fx.session.session_id.as_str()).unwrap();
    assert_eq!(session.tasks.len(), 1);
}

#[tokio::test]
async fn concurrent_prompts_one_wins() {
    let fx = fixture();
    let a = {
        let engine = fx.engine.clone();
        let id = fx.session.session_id.clone();
        tokio::spawn(async move { engine.prompt(id.as_str(), "a", None).await })
    };
    let b = {
        let engine = fx.engine.clone();
        let id = fx.session.session_id.clone();
        tokio::spawn(async move { engine.prompt(id.as_str(), "b", None).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let busy = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.kind == ErrorKind::SessionBusy))
        .count();
    assert_eq!((ok, busy), (1, 1));
}

#[tokio::test]
async fn archived_session_rejects_prompts() {
    let fx = fixture();
    fx.engine
        .store
        .update::<Session>(fx.session.session_id.as_str(), |s| s.archived = true)
        .unwrap();

    let err = fx.engine.prompt(fx.session.session_id.as_str(), "hi", None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ValidationFailed);
}

#[tokio::test]
async fn foreign_permission_mode_is_rejected() {
    let fx = fixture();
    let err = fx
        .engine
        .prompt(fx.session.session_id.as_str(), "hi", Some(PermissionMode::FullAccess))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ValidationFailed);

    // Nothing durable happened.
    let session: Session = fx.engine.store.get(fx.session.session_id.as_str()).unwrap();
    assert!(session.tasks.is_empty());
}

#[tokio::test]
async fn empty_prompt_is_rejected() {
    let fx = fixture();
    let err = fx.engine.prompt(fx.session.session_id.as_str(), "  \n", None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ValidationFailed);
}

#[tokio::test]
async fn spawn_failure_fails_the_task() {
    let fx = fixture();
    fx.spawner.fail_next.store(true, std::sync::atomic::Ordering::SeqCst);

    let err = fx.engine.prompt(fx.session.session_id.as_str(), "hi", None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ExecutorSpawnFailed);

    let session: Session = fx.engine.store.get(fx.session.session_id.as_str()).unwrap();
    let task: Task = fx.engine.store.get(session.tasks[0].as_str()).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(session.status, SessionStatus::Failed);
}

#[tokio::test]
async fn executor_crash_marks_task_failed_with_stderr() {
    let fx = fixture();
    let task = fx.engine.prompt(fx.session.session_id.as_str(), "hi", None).await.unwrap();

    fx.spawner.control(0).exit_with_stderr(13, "panicked at src/main.rs");

    let store = fx.engine.store.clone();
    let task_id = task.task_id.clone();
    wait_for(|| {
        store.maybe_get::<Task>(task_id.as_str()).is_some_and(|t| t.status.is_terminal())
    })
    .await;

    let task: Task = fx.engine.store.get(task.task_id.as_str()).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    let error = task.error.unwrap();
    assert_eq!(error.kind, ErrorKind::ExecutorCrashed);
    assert!(error.details.unwrap()["stderr"].as_str().unwrap().contains("panicked"));
    // Best-effort end SHA was captured (the path is not a repo → unknown).
    assert_eq!(task.git_state.sha_at_end.as_deref(), Some("unknown"));

    let session: Session = fx.engine.store.get(fx.session.session_id.as_str()).unwrap();
    assert_eq!(session.status, SessionStatus::Failed);
}

#[tokio::test]
async fn executor_finalize_completes_without_repair() {
    let fx = fixture();
    let task = fx.engine.prompt(fx.session.session_id.as_str(), "hi", None).await.unwrap();

    // The executor finalizes through the tasks service, then exits 0.
    fx.engine
        .finalize_task(&task.task_id, TaskStatus::Completed, None, Some("abc123".into()))
        .await
        .unwrap();
    fx.spawner.control(0).exit(0, None);

    // Give the watch task a beat; the status must remain completed.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let task: Task = fx.engine.store.get(task.task_id.as_str()).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.git_state.sha_at_end.as_deref(), Some("abc123"));
    assert!(task.completed_at.is_some());

    let session: Session = fx.engine.store.get(fx.session.session_id.as_str()).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
}

#[tokio::test]
async fn next_prompt_allowed_after_terminal() {
    let fx = fixture();
    let first = fx.engine.prompt(fx.session.session_id.as_str(), "one", None).await.unwrap();
    fx.engine.finalize_task(&first.task_id, TaskStatus::Completed, None, None).await.unwrap();
    fx.spawner.control(0).exit(0, None);

    let second = fx.engine.prompt(fx.session.session_id.as_str(), "two", None).await.unwrap();
    assert_ne!(first.task_id, second.task_id);

    let session: Session = fx.engine.store.get(fx.session.session_id.as_str()).unwrap();
    assert_eq!(session.tasks, vec![first.task_id, second.task_id]);
}

#[tokio::test]
async fn impersonation_uses_session_snapshot() {
    let mut config = crate::EngineConfig::default();
    config.impersonation = crate::ImpersonationMode::Strict;
    let fx = crate::test_helpers::fixture_with(config);

    fx.engine.prompt(fx.session.session_id.as_str(), "hi", None).await.unwrap();
    assert_eq!(fx.spawner.last_request().run_as.as_deref(), Some("alice"));
}

#[tokio::test]
async fn status_events_flow_in_order() {
    let fx = fixture();
    let task = fx.engine.prompt(fx.session.session_id.as_str(), "hi", None).await.unwrap();
    fx.engine.finalize_task(&task.task_id, TaskStatus::Completed, None, None).await.unwrap();

    let names = fx.sink.names();
    let task_events: Vec<&&str> = names.iter().filter(|n| **n == "task:status").collect();
    assert!(task_events.len() >= 3, "pending, running, completed: {names:?}");
    assert!(names.contains(&"session:status"));

    // No stopped-complete for a completed task.
    assert!(!names.contains(&"task:stopped:complete"));
    let events = fx.sink.events();
    let statuses: Vec<TaskStatus> = events
        .iter()
        .filter_map(|e| match e {
            Event::TaskStatusChanged { status, .. } => Some(*status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![TaskStatus::Pending, TaskStatus::Running, TaskStatus::Completed]);
}
