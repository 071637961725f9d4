// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel-scoped event broadcast.
//!
//! Subscribers hang a bounded queue off the hub; a slow consumer whose
//! queue overflows is disconnected, never the publisher. Channel names
//! are plain strings (`session:<id>`, `board:<id>`, ...).

use agor_core::{channel, Event};
use agor_engine::EventSink;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Bounded per-subscriber queue depth.
pub const SUBSCRIBER_QUEUE: usize = 256;

pub type SubscriberId = u64;

struct Subscriber {
    channels: HashSet<String>,
    tx: mpsc::Sender<(Vec<String>, Event)>,
}

#[derive(Default)]
pub struct ChannelHub {
    subscribers: Mutex<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; it receives events for channels it joins.
    pub fn register(&self) -> (SubscriberId, mpsc::Receiver<(Vec<String>, Event)>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        self.subscribers
            .lock()
            .insert(id, Subscriber { channels: HashSet::new(), tx });
        (id, rx)
    }

    pub fn join(&self, id: SubscriberId, channels: &[String]) {
        if let Some(sub) = self.subscribers.lock().get_mut(&id) {
            sub.channels.extend(channels.iter().cloned());
        }
    }

    pub fn leave(&self, id: SubscriberId, channels: &[String]) {
        if let Some(sub) = self.subscribers.lock().get_mut(&id) {
            for channel in channels {
                sub.channels.remove(channel);
            }
        }
    }

    pub fn unregister(&self, id: SubscriberId) {
        self.subscribers.lock().remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver to every subscriber of any listed channel. Overflowing
    /// subscribers are dropped on the spot.
    pub fn publish_to(&self, channels: Vec<String>, event: Event) {
        if channels.is_empty() {
            debug!(event = event.name(), "event with no channels; dropping");
            return;
        }
        let mut dead = Vec::new();
        {
            let subscribers = self.subscribers.lock();
            for (id, sub) in subscribers.iter() {
                if !channels.iter().any(|c| sub.channels.contains(c)) {
                    continue;
                }
                match sub.tx.try_send((channels.clone(), event.clone())) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(subscriber = id, "subscriber queue overflow; disconnecting");
                        dead.push(*id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*id),
                }
            }
        }
        let mut subscribers = self.subscribers.lock();
        for id in dead {
            subscribers.remove(&id);
        }
    }

    /// Broadcast using the event's intrinsic channels, falling back to
    /// data-derived channels for service CRUD events.
    pub fn broadcast(&self, event: Event) {
        let channels = match &event {
            Event::ServiceCreated { service, data }
            | Event::ServicePatched { service, data }
            | Event::ServiceUpdated { service, data }
            | Event::ServiceRemoved { service, data } => service_channels(service, data),
            other => other.channels(),
        };
        self.publish_to(channels, event);
    }
}

impl EventSink for ChannelHub {
    fn publish(&self, event: Event) {
        self.broadcast(event);
    }
}

/// Channels a service record broadcast lands on: the service firehose
/// plus every scoping id present in the record.
pub fn service_channels(service: &str, data: &Value) -> Vec<String> {
    let mut channels = vec![channel::service(service)];
    for (field, prefix) in [
        ("session_id", "session"),
        ("worktree_id", "worktree"),
        ("board_id", "board"),
        ("user_id", "user"),
    ] {
        if let Some(id) = data.get(field).and_then(Value::as_str) {
            channels.push(format!("{prefix}:{id}"));
        }
    }
    channels
}

#[cfg(test)]
#[path = "channels_tests.rs"]
mod tests;
