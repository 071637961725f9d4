// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario 1 — happy prompt — and scenario 2 — the busy gate.

use super::helpers::{git, wait_for, world};
use agor_core::{Message, MessageId, Session, SessionStatus, Task, TaskStatus};
use agor_wire::{Request, Response};
use serde_json::json;

#[tokio::test]
async fn happy_prompt_end_to_end() {
    let w = world();
    let session_id = w.session.session_id.to_string();

    // POST sessions/:id/prompt.
    let task = w
        .call_alice(
            "sessions",
            "prompt",
            Some(&session_id),
            json!({"prompt": "write hello.txt", "permissionMode": "acceptEdits"}),
        )
        .await;
    let task_id = task["task_id"].as_str().unwrap().to_string();
    assert_eq!(task["status"], "running");

    // Session went running; the user message is durable.
    let session: Session = w.state.store.get(&session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Running);
    assert_eq!(session.message_count, 1);

    // The executor streams an assistant reply...
    let message_id = MessageId::new().to_string();
    w.stream(json!({"kind": "start", "session_id": session_id, "task_id": task_id, "message_id": message_id, "meta": {"role": "assistant"}})).await;
    w.stream(json!({"kind": "chunk", "session_id": session_id, "task_id": task_id, "message_id": message_id, "text": "created hello.txt"})).await;
    w.stream(json!({"kind": "end", "session_id": session_id, "task_id": task_id, "message_id": message_id})).await;

    // ...does the work in the worktree...
    std::fs::write(w.worktree.path.join("hello.txt"), "hello\n").unwrap();
    git(&w.worktree.path, &["add", "."]);
    git(&w.worktree.path, &["commit", "-q", "-m", "hello"]);
    let sha_at_end = agor_engine::git::capture_sha(&w.worktree.path).await;

    // ...and finalizes with normalized usage.
    w.finalize(
        &task_id,
        json!({
            "status": "completed",
            "git_state": {"sha_at_end": sha_at_end},
            "raw_sdk_response": {"usage": {"input_tokens": 1200, "output_tokens": 300}},
            "normalized_sdk_response": {
                "tokenUsage": {"input": 1200, "output": 300},
                "primaryModel": "claude-sonnet-4-5",
                "contextWindowLimit": 200000,
            },
            "computed_context_window": 1500,
        }),
    )
    .await;
    w.spawner.control(0).exit(0, None);

    // Session settles; the task is terminal with both SHAs.
    let task: Task = w.state.store.get(&task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    let start = task.git_state.sha_at_start.unwrap();
    let end = task.git_state.sha_at_end.unwrap();
    assert_ne!(start, end);
    assert!(!end.ends_with("-dirty"));
    assert!(task.normalized_sdk_response.unwrap().total_tokens() > 0);
    assert_eq!(task.message_range.start_index, 0);
    assert_eq!(task.message_range.end_index, Some(2));
    assert!(task.completed_at.is_some());

    let session: Session = w.state.store.get(&session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.message_count, 2);

    // ≥ 2 messages: the user prompt and the assistant reply.
    let messages: Vec<Message> = w
        .state
        .store
        .all::<Message>()
        .into_iter()
        .filter(|m| m.session_id.as_str() == session_id)
        .collect();
    assert!(messages.len() >= 2);
    assert!(messages.iter().any(|m| m.role == agor_core::MessageRole::User));
    assert!(messages.iter().any(|m| m.role == agor_core::MessageRole::Assistant));
}

#[tokio::test]
async fn busy_gate_exactly_one_wins() {
    let w = world();
    let session_id = w.session.session_id.to_string();

    let prompt = |text: &str| {
        let state = w.state.clone();
        let principal = w.as_alice();
        let session_id = session_id.clone();
        let params = json!({"prompt": text});
        tokio::spawn(async move {
            state
                .registry()
                .dispatch(
                    &state.hub,
                    principal,
                    Request::Call {
                        service: "sessions".into(),
                        route: "prompt".into(),
                        id: Some(session_id),
                        params,
                    },
                )
                .await
        })
    };

    let (a, b) = (prompt("first"), prompt("second"));
    let results = [a.await.unwrap(), b.await.unwrap()];

    let ok = results.iter().filter(|r| matches!(r, Response::Record { .. })).count();
    let busy = results
        .iter()
        .filter(|r| {
            matches!(r, Response::Error { error } if error.kind == agor_core::ErrorKind::SessionBusy)
        })
        .count();
    assert_eq!((ok, busy), (1, 1), "results: {results:?}");

    let session: Session = w.state.store.get(&session_id).unwrap();
    assert_eq!(session.tasks.len(), 1);

    // After the winner terminates, a new prompt is accepted.
    let task_id = session.tasks[0].to_string();
    w.finalize(&task_id, json!({"status": "completed"})).await;
    w.spawner.control(0).exit(0, None);
    let store = w.state.store.clone();
    wait_for(|| {
        store
            .maybe_get::<Session>(&session_id)
            .is_some_and(|s| s.status == SessionStatus::Completed)
    })
    .await;
    w.call_alice("sessions", "prompt", Some(&session_id), json!({"prompt": "third"})).await;
}
