// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn events_serialize_with_type_tag() {
    let event = Event::StreamChunk {
        session_id: SessionId::from_string("s-1"),
        message_id: MessageId::from_string("m-1"),
        text: "hello".into(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "message:streaming:chunk");
    assert_eq!(json["text"], "hello");
}

#[test]
fn stream_events_target_the_session_channel() {
    let session = SessionId::from_string("0192f0c1-aaaa-7abc-9def-0123456789ab");
    let event = Event::StreamEnd {
        session_id: session.clone(),
        message_id: MessageId::new(),
    };
    assert_eq!(event.channels(), vec![format!("session:{session}")]);
}

#[test]
fn service_events_have_no_intrinsic_channels() {
    let event = Event::ServiceCreated {
        service: "repos".into(),
        data: serde_json::json!({"repo_id": "r-1"}),
    };
    assert!(event.channels().is_empty());
}

#[test]
fn worktree_status_reaches_service_firehose() {
    let event = Event::WorktreeStatusChanged {
        worktree_id: WorktreeId::from_string("w-1"),
        status: FilesystemStatus::Ready,
        error: None,
    };
    let channels = event.channels();
    assert!(channels.contains(&"worktree:w-1".to_string()));
    assert!(channels.contains(&"service:worktrees".to_string()));
}

#[test]
fn event_round_trip() {
    let event = Event::TaskStatusChanged {
        session_id: SessionId::from_string("s-1"),
        task_id: TaskId::from_string("t-1"),
        status: TaskStatus::Running,
    };
    let json = serde_json::to_string(&event).unwrap();
    let parsed: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn terminal_channel_with_and_without_worktree() {
    let user = crate::id::UserId::from_string("u-1");
    let wt = WorktreeId::from_string("w-1");
    assert_eq!(channel::terminal(&user, Some(&wt)), "terminal:u-1:w-1");
    assert_eq!(channel::terminal(&user, None), "terminal:u-1");
}
