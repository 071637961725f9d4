// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_fixtures::fixture;
use agor_core::{ErrorKind, Session, Task, TaskStatus};
use agor_wire::{Request, Response};
use serde_json::json;

fn record(response: Response) -> serde_json::Value {
    match response {
        Response::Record { data } => data,
        other => panic!("expected record, got {other:?}"),
    }
}

fn error_kind(response: Response) -> ErrorKind {
    match response {
        Response::Error { error } => error.kind,
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn create_snapshots_unix_username() {
    let fx = fixture();
    let data = record(
        fx.call(
            fx.as_user(&fx.alice),
            Request::Create {
                service: "sessions".into(),
                data: json!({
                    "worktree_id": fx.worktree.worktree_id,
                    "agentic_tool": "claude-code",
                }),
            },
        )
        .await,
    );
    assert_eq!(data["unix_username"], "alice");
    assert_eq!(data["status"], "idle");

    // Later user edits do not rewrite existing sessions (I5).
    fx.state
        .store
        .update::<agor_core::User>(fx.alice.user_id.as_str(), |u| {
            u.unix_username = Some("renamed".into());
        })
        .unwrap();
    let session: Session =
        fx.state.store.get(data["session_id"].as_str().unwrap()).unwrap();
    assert_eq!(session.unix_username.as_deref(), Some("alice"));
}

#[tokio::test]
async fn create_rejects_foreign_permission_mode() {
    let fx = fixture();
    let kind = error_kind(
        fx.call(
            fx.as_user(&fx.alice),
            Request::Create {
                service: "sessions".into(),
                data: json!({
                    "worktree_id": fx.worktree.worktree_id,
                    "agentic_tool": "codex",
                    "permission_config": {"mode": "acceptEdits"},
                }),
            },
        )
        .await,
    );
    assert_eq!(kind, ErrorKind::ValidationFailed);
}

#[tokio::test]
async fn prompt_route_runs_the_pipeline() {
    let fx = fixture();
    let data = record(
        fx.call(
            fx.as_user(&fx.alice),
            Request::Call {
                service: "sessions".into(),
                route: "prompt".into(),
                id: Some(fx.session.session_id.to_string()),
                params: json!({"prompt": "write hello.txt", "permissionMode": "acceptEdits"}),
            },
        )
        .await,
    );
    assert_eq!(data["status"], "running");
    assert_eq!(data["description"], "write hello.txt");

    // Second prompt hits the busy gate.
    let kind = error_kind(
        fx.call(
            fx.as_user(&fx.alice),
            Request::Call {
                service: "sessions".into(),
                route: "prompt".into(),
                id: Some(fx.session.session_id.to_string()),
                params: json!({"prompt": "again"}),
            },
        )
        .await,
    );
    assert_eq!(kind, ErrorKind::SessionBusy);
}

#[tokio::test]
async fn viewer_cannot_prompt() {
    let fx = fixture();
    let viewer = fx
        .state
        .store
        .create(
            agor_core::test_support::UserBuilder::default()
                .email("viewer@example.com")
                .role(agor_core::Role::Viewer)
                .build(),
        )
        .unwrap();
    let kind = error_kind(
        fx.call(
            fx.as_user(&viewer),
            Request::Call {
                service: "sessions".into(),
                route: "prompt".into(),
                id: Some(fx.session.session_id.to_string()),
                params: json!({"prompt": "hi"}),
            },
        )
        .await,
    );
    assert_eq!(kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn stop_route_is_noop_on_idle_session() {
    let fx = fixture();
    let data = record(
        fx.call(
            fx.as_user(&fx.alice),
            Request::Call {
                service: "sessions".into(),
                route: "stop".into(),
                id: Some(fx.session.session_id.to_string()),
                params: json!({}),
            },
        )
        .await,
    );
    assert_eq!(data["stopping"], false);
}

#[tokio::test]
async fn decision_allow_session_scope_persists_tool() {
    let fx = fixture();
    // Start a task and surface a permission request through streaming.
    let task = record(
        fx.call(
            fx.as_user(&fx.alice),
            Request::Call {
                service: "sessions".into(),
                route: "prompt".into(),
                id: Some(fx.session.session_id.to_string()),
                params: json!({"prompt": "dangerous thing"}),
            },
        )
        .await,
    );
    let task_id = task["task_id"].as_str().unwrap().to_string();
    record(
        fx.call(
            crate::hooks::Principal::Internal { user: None },
            Request::Call {
                service: "messages".into(),
                route: "streaming".into(),
                id: None,
                params: json!({
                    "kind": "permission_request",
                    "session_id": fx.session.session_id,
                    "task_id": task_id,
                    "tool_name": "Bash",
                }),
            },
        )
        .await,
    );
    let session: Session = fx.state.store.get(fx.session.session_id.as_str()).unwrap();
    assert_eq!(session.status, agor_core::SessionStatus::AwaitingPermission);

    // Prompting while awaiting permission is SessionBusy.
    let kind = error_kind(
        fx.call(
            fx.as_user(&fx.alice),
            Request::Call {
                service: "sessions".into(),
                route: "prompt".into(),
                id: Some(fx.session.session_id.to_string()),
                params: json!({"prompt": "another"}),
            },
        )
        .await,
    );
    assert_eq!(kind, ErrorKind::SessionBusy);

    let decision = record(
        fx.call(
            fx.as_user(&fx.alice),
            Request::Call {
                service: "sessions".into(),
                route: "decision".into(),
                id: Some(fx.session.session_id.to_string()),
                params: json!({"allow": true, "scope": "session", "tool_name": "Bash"}),
            },
        )
        .await,
    );
    assert_eq!(decision["allowed"], true);

    let session: Session = fx.state.store.get(fx.session.session_id.as_str()).unwrap();
    assert!(session.permission_config.allowed_tools.contains(&"Bash".to_string()));
    let task: Task = fx.state.store.get(&task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Running);
}

#[tokio::test]
async fn usage_context_route_returns_history() {
    let fx = fixture();
    let mut task = agor_core::test_support::TaskBuilder::default()
        .session(fx.session.session_id.clone())
        .status(TaskStatus::Completed)
        .build();
    task.raw_sdk_response = Some(json!({"usage": {"input_tokens": 9}}));
    let task = fx.state.store.create(task).unwrap();
    fx.state
        .store
        .update::<Session>(fx.session.session_id.as_str(), |s| {
            s.tasks.push(task.task_id.clone())
        })
        .unwrap();

    let data = record(
        fx.call(
            fx.as_user(&fx.alice),
            Request::Call {
                service: "sessions".into(),
                route: "usage-context".into(),
                id: Some(fx.session.session_id.to_string()),
                params: json!({}),
            },
        )
        .await,
    );
    assert_eq!(data["history"].as_array().unwrap().len(), 1);
    assert_eq!(data["previous_raw"]["usage"]["input_tokens"], 9);
}
