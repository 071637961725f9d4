// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use agor_core::{SessionId, SessionStatus};
use serde_json::json;

fn status_event(session: &str) -> Event {
    Event::SessionStatusChanged {
        session_id: SessionId::from_string(session),
        status: SessionStatus::Running,
    }
}

#[tokio::test]
async fn subscribers_receive_only_their_channels() {
    let hub = ChannelHub::new();
    let (a, mut rx_a) = hub.register();
    let (b, mut rx_b) = hub.register();
    hub.join(a, &["session:s-1".into()]);
    hub.join(b, &["session:s-2".into()]);

    hub.broadcast(status_event("s-1"));

    let (channels, event) = rx_a.recv().await.unwrap();
    assert_eq!(channels, vec!["session:s-1"]);
    assert_eq!(event.name(), "session:status");
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn leave_stops_delivery() {
    let hub = ChannelHub::new();
    let (id, mut rx) = hub.register();
    hub.join(id, &["session:s-1".into()]);
    hub.leave(id, &["session:s-1".into()]);

    hub.broadcast(status_event("s-1"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn overflowing_subscriber_is_disconnected() {
    let hub = ChannelHub::new();
    let (id, _rx) = hub.register();
    hub.join(id, &["session:s-1".into()]);

    // Never drain; the queue fills, then the hub drops the subscriber.
    for _ in 0..(SUBSCRIBER_QUEUE + 2) {
        hub.broadcast(status_event("s-1"));
    }
    assert_eq!(hub.subscriber_count(), 0);

    // Publishing continues to work with no subscribers.
    hub.broadcast(status_event("s-1"));
}

#[tokio::test]
async fn service_events_derive_channels_from_data() {
    let hub = ChannelHub::new();
    let (id, mut rx) = hub.register();
    hub.join(id, &["session:s-9".into()]);

    hub.broadcast(Event::ServiceCreated {
        service: "messages".into(),
        data: json!({"message_id": "m-1", "session_id": "s-9"}),
    });

    let (channels, _) = rx.recv().await.unwrap();
    assert!(channels.contains(&"service:messages".to_string()));
    assert!(channels.contains(&"session:s-9".to_string()));
}

#[test]
fn service_channel_derivation_covers_scopes() {
    let channels = service_channels(
        "worktrees",
        &json!({"worktree_id": "w-1", "board_id": "b-1", "user_id": "u-1"}),
    );
    assert_eq!(
        channels,
        vec!["service:worktrees", "worktree:w-1", "board:b-1", "user:u-1"]
    );
}

#[tokio::test]
async fn unregistered_subscriber_is_gone() {
    let hub = ChannelHub::new();
    let (id, mut rx) = hub.register();
    hub.join(id, &["session:s-1".into()]);
    hub.unregister(id);

    hub.broadcast(status_event("s-1"));
    assert!(rx.try_recv().is_err());
    assert_eq!(hub.subscriber_count(), 0);
}
