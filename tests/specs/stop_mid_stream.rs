// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario 3 — stop mid-stream: chunks land first, then the stopped
//! task completes with a final drain event.

use super::helpers::{wait_for, world};
use agor_core::{MessageId, Task, TaskStatus};
use serde_json::json;

#[tokio::test]
async fn stop_lands_after_streamed_chunks() {
    let w = world();
    let session_id = w.session.session_id.to_string();

    // Observe the session channel like a web client would.
    let (subscriber, mut rx) = w.state.hub.register();
    w.state.hub.join(subscriber, &[format!("session:{session_id}")]);

    let task = w
        .call_alice("sessions", "prompt", Some(&session_id), json!({"prompt": "long task"}))
        .await;
    let task_id = task["task_id"].as_str().unwrap().to_string();

    // The executor streams a first chunk...
    let message_id = MessageId::new().to_string();
    w.stream(json!({"kind": "start", "session_id": session_id, "task_id": task_id, "message_id": message_id})).await;
    w.stream(json!({"kind": "chunk", "session_id": session_id, "task_id": task_id, "message_id": message_id, "text": "working on it"})).await;

    // ...the user stops the task mid-stream.
    let stop = w
        .call_alice("sessions", "stop", Some(&session_id), json!({}))
        .await;
    assert_eq!(stop["stopping"], true);

    // The cooperative stop reaches the scripted executor, which drains
    // its stream and finalizes `stopped` in its finally block.
    let spawner = w.spawner.clone();
    wait_for(|| spawner.control(0).stop_seen.load(std::sync::atomic::Ordering::SeqCst)).await;
    w.stream(json!({"kind": "end", "session_id": session_id, "task_id": task_id, "message_id": message_id})).await;
    let sha_at_end = agor_engine::git::capture_sha(&w.worktree.path).await;
    w.finalize(&task_id, json!({"status": "stopped", "git_state": {"sha_at_end": sha_at_end}}))
        .await;

    let task: Task = w.state.store.get(&task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Stopped);
    assert!(task.git_state.sha_at_end.is_some());

    // Event order on the wire: at least one chunk before the final
    // task_stopped_complete.
    let mut names = Vec::new();
    while let Ok((_, event)) = rx.try_recv() {
        names.push(event.name().to_string());
    }
    let chunk = names.iter().position(|n| n == "message:streaming:chunk");
    let stopped = names.iter().position(|n| n == "task:stopped:complete");
    assert!(chunk.is_some(), "no chunk observed: {names:?}");
    assert!(stopped.is_some(), "no stopped-complete observed: {names:?}");
    assert!(chunk < stopped, "order violated: {names:?}");

    // R2: stopping a terminal task changes nothing and emits nothing.
    let before = names.len();
    let again = w.call_alice("sessions", "stop", Some(&session_id), json!({})).await;
    assert_eq!(again["stopping"], false);
    let mut after = 0;
    while rx.try_recv().is_ok() {
        after += 1;
    }
    assert_eq!(after, 0, "stop on terminal task emitted events (saw {before} before)");
}
