// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The messages service and the `messages/streaming` fan-out route.
//!
//! Executors cannot emit events into the daemon's channel system; this
//! route is the one correct path. Each streamed assistant message is
//! buffered here until its `end` (or `error`) arrives, then persisted as
//! message content.

use super::{CallCtx, Service};
use crate::hooks::{require_authenticated, HookSet, Principal};
use crate::state::AppState;
use agor_core::{
    AgorError, Clock, ContentBlock, ErrorKind, Event, Message, MessageId, MessageRole, Session,
    SessionId, StreamMeta, Task, TaskId, TaskStatus,
};
use agor_wire::FindQuery;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// In-flight assistant message text.
struct StreamBuf {
    session_id: SessionId,
    text: String,
}

pub struct MessagesService<C: Clock + 'static> {
    state: Arc<AppState<C>>,
    buffers: Mutex<HashMap<String, StreamBuf>>,
}

impl<C: Clock + 'static> MessagesService<C> {
    pub fn new(state: Arc<AppState<C>>) -> Arc<Self> {
        Arc::new(Self { state, buffers: Mutex::new(HashMap::new()) })
    }

    fn require_streamer(ctx: &CallCtx) -> Result<(), AgorError> {
        match &ctx.principal {
            Principal::Executor { .. } | Principal::Internal { .. } => Ok(()),
            _ => Err(AgorError::forbidden("streaming is an executor-only route")),
        }
    }

    fn append_block(&self, message_id: &str, block: ContentBlock) -> Result<Message, AgorError> {
        self.state.store.update::<Message>(message_id, |m| m.content.push(block))
    }
}

fn parse_ids(params: &Value) -> Result<(SessionId, TaskId), AgorError> {
    let session_id = params
        .get("session_id")
        .and_then(Value::as_str)
        .ok_or_else(|| AgorError::validation("session_id is required"))?;
    let task_id = params
        .get("task_id")
        .and_then(Value::as_str)
        .ok_or_else(|| AgorError::validation("task_id is required"))?;
    Ok((SessionId::from_string(session_id), TaskId::from_string(task_id)))
}

fn message_id_of(params: &Value) -> Result<MessageId, AgorError> {
    params
        .get("message_id")
        .and_then(Value::as_str)
        .map(MessageId::from_string)
        .ok_or_else(|| AgorError::validation("message_id is required"))
}

#[async_trait]
impl<C: Clock + 'static> Service<C> for MessagesService<C> {
    fn name(&self) -> &'static str {
        "messages"
    }

    fn hooks(&self) -> HookSet {
        HookSet::new().before(require_authenticated())
    }

    /// Transcript reads; total order by timestamp unless overridden.
    async fn find(&self, _ctx: &CallCtx, query: FindQuery) -> Result<Vec<Value>, AgorError> {
        let mut query = query;
        if query.sort.is_empty() {
            query
                .sort
                .insert("timestamp".to_string(), agor_wire::SortDirection::Ascending);
        }
        Ok(query.apply(self.state.store.all_raw(agor_storage::Table::Messages)))
    }

    async fn get(&self, _ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        let message: Message = self.state.store.get(id)?;
        serde_json::to_value(message)
            .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
    }

    async fn call(
        &self,
        ctx: &CallCtx,
        route: &str,
        _id: Option<&str>,
        params: Value,
    ) -> Result<Value, AgorError> {
        if route != "streaming" {
            return Err(AgorError::not_found(format!("messages route {route:?}")));
        }
        Self::require_streamer(ctx)?;

        let kind = params
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("kind is required"))?;
        let (session_id, task_id) = parse_ids(&params)?;

        match kind {
            "start" => {
                let message_id = message_id_of(&params)?;
                let meta: StreamMeta = params
                    .get("meta")
                    .cloned()
                    .and_then(|m| serde_json::from_value(m).ok())
                    .unwrap_or_default();
                let now = self.state.store.clock().utc_now();
                let message = Message {
                    message_id: message_id.clone(),
                    session_id: session_id.clone(),
                    task_id: task_id.clone(),
                    role: MessageRole::Assistant,
                    content: Vec::new(),
                    timestamp: now,
                    parent_tool_use_id: meta.parent_tool_use_id.clone(),
                };
                self.state.store.create(message)?;
                self.state.store.update::<Session>(session_id.as_str(), |s| {
                    s.message_count += 1;
                })?;
                self.buffers.lock().insert(
                    message_id.to_string(),
                    StreamBuf { session_id: session_id.clone(), text: String::new() },
                );
                self.state.hub.broadcast(Event::StreamStart { session_id, message_id, meta });
            }
            "chunk" => {
                let message_id = message_id_of(&params)?;
                let text = params.get("text").and_then(Value::as_str).unwrap_or("");
                if let Some(buf) = self.buffers.lock().get_mut(message_id.as_str()) {
                    buf.text.push_str(text);
                }
                self.state.hub.broadcast(Event::StreamChunk {
                    session_id,
                    message_id,
                    text: text.to_string(),
                });
            }
            "end" | "error" => {
                let message_id = message_id_of(&params)?;
                let buffered = self.buffers.lock().remove(message_id.as_str());
                let mut final_text = String::new();
                if let Some(buf) = buffered {
                    if !buf.text.is_empty() {
                        self.append_block(message_id.as_str(), ContentBlock::text(&buf.text))?;
                        final_text = buf.text;
                    }
                    debug_assert_eq!(buf.session_id, session_id);
                }
                if kind == "end" {
                    self.state.hub.broadcast(Event::StreamEnd {
                        session_id: session_id.clone(),
                        message_id,
                    });
                    // Outbound gateway routing (fast-path no-op when no
                    // channel is active).
                    if !final_text.is_empty() {
                        let state = self.state.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                crate::gateway::route_message(&state, &session_id, &final_text)
                                    .await
                            {
                                warn!(error = %e, "outbound gateway routing failed");
                            }
                        });
                    }
                } else {
                    let error = params
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("stream failed")
                        .to_string();
                    self.state.hub.broadcast(Event::StreamError { session_id, message_id, error });
                }
            }
            "thinking_start" => {
                let message_id = message_id_of(&params)?;
                self.state.hub.broadcast(Event::ThinkingStart { session_id, message_id });
            }
            "thinking_chunk" => {
                let message_id = message_id_of(&params)?;
                let text =
                    params.get("text").and_then(Value::as_str).unwrap_or("").to_string();
                self.state.hub.broadcast(Event::ThinkingChunk { session_id, message_id, text });
            }
            "thinking_end" => {
                let message_id = message_id_of(&params)?;
                self.state.hub.broadcast(Event::ThinkingEnd { session_id, message_id });
            }
            "tool_use" => {
                let message_id = message_id_of(&params)?;
                let block = ContentBlock::ToolUse {
                    id: params
                        .get("tool_use_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    name: params
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    input: params.get("input").cloned().unwrap_or(Value::Null),
                };
                let message = self.append_block(message_id.as_str(), block)?;
                self.state
                    .store
                    .update::<Task>(task_id.as_str(), |t| t.tool_use_count += 1)?;
                self.state.hub.broadcast(Event::ServicePatched {
                    service: "messages".into(),
                    data: serde_json::to_value(&message).unwrap_or_default(),
                });
            }
            "tool_result" => {
                let message_id = message_id_of(&params)?;
                let block = ContentBlock::ToolResult {
                    tool_use_id: params
                        .get("tool_use_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    content: params.get("content").cloned().unwrap_or(Value::Null),
                    is_error: params.get("is_error").and_then(Value::as_bool).unwrap_or(false),
                };
                let message = self.append_block(message_id.as_str(), block)?;
                self.state.hub.broadcast(Event::ServicePatched {
                    service: "messages".into(),
                    data: serde_json::to_value(&message).unwrap_or_default(),
                });
            }
            "permission_request" => {
                let tool_name = params
                    .get("tool_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let task = self.state.store.maybe_get::<Task>(task_id.as_str());
                match task {
                    Some(task) if !task.status.is_terminal() => {
                        let task = self.state.store.patch::<Task>(
                            task.task_id.as_str(),
                            json!({"status": TaskStatus::AwaitingPermission}),
                        )?;
                        self.state.engine.handle_task_transition(&task);
                    }
                    _ => warn!(%task_id, "permission request for a finished task"),
                }
                self.state.hub.broadcast(Event::PermissionRequest {
                    session_id,
                    task_id,
                    tool_name,
                    input: params.get("input").cloned(),
                });
            }
            other => {
                debug!(kind = other, "unknown streaming kind");
                return Err(AgorError::validation(format!("unknown streaming kind {other:?}")));
            }
        }
        Ok(json!({"accepted": true}))
    }
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
