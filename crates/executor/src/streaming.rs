// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming fan-in: adapter callbacks → `messages/streaming` route.
//!
//! Callbacks are synchronous; they enqueue typed route params onto an
//! unbounded channel and a forwarder task delivers them to the daemon
//! in order. FIFO delivery preserves the per-`message_id` ordering the
//! adapters already guarantee.

use agor_adapters::StreamCallbacks;
use agor_core::{MessageId, SessionId, StreamMeta, TaskId};
use agor_wire::DaemonClient;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

pub struct ForwardingCallbacks {
    session_id: SessionId,
    task_id: TaskId,
    tx: mpsc::UnboundedSender<Value>,
}

impl ForwardingCallbacks {
    fn send(&self, kind: &str, message_id: Option<&MessageId>, mut extra: Value) {
        let mut params = json!({
            "kind": kind,
            "session_id": self.session_id,
            "task_id": self.task_id,
        });
        if let Some(message_id) = message_id {
            params["message_id"] = json!(message_id);
        }
        if let Some(obj) = extra.as_object_mut() {
            if let Some(target) = params.as_object_mut() {
                target.append(obj);
            }
        }
        if self.tx.send(params).is_err() {
            warn!(kind, "streaming forwarder gone; dropping event");
        }
    }
}

impl StreamCallbacks for ForwardingCallbacks {
    fn on_stream_start(&self, message_id: &MessageId, meta: StreamMeta) {
        self.send("start", Some(message_id), json!({"meta": meta}));
    }

    fn on_stream_chunk(&self, message_id: &MessageId, text: &str) {
        self.send("chunk", Some(message_id), json!({"text": text}));
    }

    fn on_stream_end(&self, message_id: &MessageId) {
        self.send("end", Some(message_id), json!({}));
    }

    fn on_stream_error(&self, message_id: &MessageId, error: &str) {
        self.send("error", Some(message_id), json!({"error": error}));
    }

    fn on_thinking_start(&self, message_id: &MessageId) {
        self.send("thinking_start", Some(message_id), json!({}));
    }

    fn on_thinking_chunk(&self, message_id: &MessageId, text: &str) {
        self.send("thinking_chunk", Some(message_id), json!({"text": text}));
    }

    fn on_thinking_end(&self, message_id: &MessageId) {
        self.send("thinking_end", Some(message_id), json!({}));
    }

    fn on_tool_use(&self, message_id: &MessageId, id: &str, name: &str, input: &Value) {
        self.send(
            "tool_use",
            Some(message_id),
            json!({"tool_use_id": id, "name": name, "input": input}),
        );
    }

    fn on_tool_result(
        &self,
        message_id: &MessageId,
        tool_use_id: &str,
        content: &Value,
        is_error: bool,
    ) {
        self.send(
            "tool_result",
            Some(message_id),
            json!({"tool_use_id": tool_use_id, "content": content, "is_error": is_error}),
        );
    }

    fn on_permission_request(&self, tool_name: &str, input: &Value) {
        self.send("permission_request", None, json!({"tool_name": tool_name, "input": input}));
    }
}

/// Build the callbacks plus the forwarder draining them to the daemon.
/// Drop the callbacks, then await the handle: that is the drain barrier
/// the finalization patch must sit behind.
pub fn spawn_forwarder(
    client: Arc<DaemonClient>,
    session_id: SessionId,
    task_id: TaskId,
) -> (ForwardingCallbacks, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let handle = tokio::spawn(async move {
        while let Some(params) = rx.recv().await {
            if let Err(e) = client.call("messages", "streaming", None, params).await {
                warn!(error = %e, "streaming delivery failed");
            }
        }
    });
    (ForwardingCallbacks { session_id, task_id, tx }, handle)
}
