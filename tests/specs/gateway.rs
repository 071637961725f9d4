// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario 4 — a gateway reply without a mapping never creates a
//! session, and the thread gets an advisory back.

use super::helpers::world;
use agor_core::Clock;
use agor_daemon::auth::AuthService;
use agor_daemon::hooks::Principal;
use agor_wire::{Request, Response};
use serde_json::json;

#[tokio::test]
async fn reply_without_mention_is_refused() {
    let w = world();

    // Bind a channel to the worktree (admin-less direct seed).
    let now = w.state.store.clock().utc_now();
    w.state
        .store
        .create(agor_core::GatewayChannel {
            channel_id: agor_core::ChannelId::new(),
            channel_type: "test".into(),
            channel_key_hash: AuthService::fingerprint("hunter2"),
            agor_user_id: w.alice.user_id.clone(),
            target_worktree_id: w.worktree.worktree_id.clone(),
            enabled: true,
            config: None,
            agentic_config: None,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap();
    agor_daemon::gateway::refresh_active_flag(&w.state);

    let sessions_before = w.state.store.all::<agor_core::Session>().len();

    // Inbound posts authenticate by channel key, not by JWT.
    let response = w
        .dispatch(
            Principal::Anonymous,
            Request::Create {
                service: "gateway-messages".into(),
                data: json!({
                    "channelKey": "hunter2",
                    "threadId": "T-random",
                    "text": "what about this?",
                    "metadata": {"requires_mapping_verification": true},
                }),
            },
        )
        .await;

    let data = match response {
        Response::Record { data } => data,
        other => panic!("expected record, got {other:?}"),
    };
    assert_eq!(data["success"], false);
    assert_eq!(data["created"], false);

    // No session, no mapping.
    assert_eq!(w.state.store.all::<agor_core::Session>().len(), sessions_before);
    assert_eq!(w.state.store.all::<agor_core::ThreadSessionMap>().len(), 0);

    // A system message went back to the thread.
    let sent = w.connector.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].thread_id, "T-random");
    assert_eq!(sent[0].metadata.as_ref().unwrap()["system"], true);
}

#[tokio::test]
async fn mentioned_message_creates_and_reuses_a_session() {
    let w = world();
    let now = w.state.store.clock().utc_now();
    w.state
        .store
        .create(agor_core::GatewayChannel {
            channel_id: agor_core::ChannelId::new(),
            channel_type: "test".into(),
            channel_key_hash: AuthService::fingerprint("hunter2"),
            agor_user_id: w.alice.user_id.clone(),
            target_worktree_id: w.worktree.worktree_id.clone(),
            enabled: true,
            config: None,
            agentic_config: None,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap();
    agor_daemon::gateway::refresh_active_flag(&w.state);

    let post = |text: &str| {
        Request::Create {
            service: "gateway-messages".into(),
            data: json!({
                "channelKey": "hunter2",
                "threadId": "T-1",
                "text": text,
            }),
        }
    };

    let first = match w.dispatch(Principal::Anonymous, post("@agor help")).await {
        Response::Record { data } => data,
        other => panic!("{other:?}"),
    };
    assert_eq!(first["success"], true);
    assert_eq!(first["created"], true);

    // Finish the task so the thread can prompt again.
    let task_id = first["task_id"].as_str().unwrap().to_string();
    w.finalize(&task_id, json!({"status": "completed"})).await;
    w.spawner.control(0).exit(0, None);

    let second = match w.dispatch(Principal::Anonymous, post("follow-up")).await {
        Response::Record { data } => data,
        other => panic!("{other:?}"),
    };
    assert_eq!(second["created"], false);
    similar_asserts::assert_eq!(second["session_id"], first["session_id"]);
}
