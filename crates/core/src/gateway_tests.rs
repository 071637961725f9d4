// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn channel(enabled: bool, config: Option<serde_json::Value>) -> GatewayChannel {
    GatewayChannel {
        channel_id: ChannelId::new(),
        channel_type: "slack".into(),
        channel_key_hash: "abcd".into(),
        agor_user_id: UserId::new(),
        target_worktree_id: WorktreeId::new(),
        enabled,
        config,
        agentic_config: None,
        last_message_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn push_listener_requires_app_token_and_enabled() {
    let with_token = serde_json::json!({"app_token": "xapp-1"});
    assert!(channel(true, Some(with_token.clone())).wants_push_listener());
    assert!(!channel(false, Some(with_token)).wants_push_listener());
    assert!(!channel(true, Some(serde_json::json!({"app_token": ""}))).wants_push_listener());
    assert!(!channel(true, None).wants_push_listener());
}

#[test]
fn thread_map_key_is_functional_in_pair() {
    let ch = ChannelId::from_string("0192f0c1-aaaa-7abc-9def-0123456789ab");
    assert_eq!(
        ThreadSessionMap::key(&ch, "T-42"),
        "0192f0c1-aaaa-7abc-9def-0123456789ab:T-42"
    );
}
