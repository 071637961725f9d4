// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events pushed to channel subscribers.
//!
//! Serializes with `{"type": "domain:verb", ...fields}` format. Service
//! CRUD mutations and engine/streaming transitions share one enum so the
//! wire carries a single tagged shape.

use crate::error::AgorError;
use crate::id::{MessageId, SessionId, TaskId, WorktreeId};
use crate::session::SessionStatus;
use crate::task::TaskStatus;
use crate::worktree::FilesystemStatus;
use serde::{Deserialize, Serialize};

/// Channel name builders. Subscribers filter events by these strings.
pub mod channel {
    use crate::id::{BoardId, SessionId, UserId, WorktreeId};

    pub fn session(id: &SessionId) -> String {
        format!("session:{id}")
    }

    pub fn board(id: &BoardId) -> String {
        format!("board:{id}")
    }

    pub fn user(id: &UserId) -> String {
        format!("user:{id}")
    }

    pub fn worktree(id: &WorktreeId) -> String {
        format!("worktree:{id}")
    }

    pub fn terminal(user: &UserId, worktree: Option<&WorktreeId>) -> String {
        match worktree {
            Some(wt) => format!("terminal:{user}:{wt}"),
            None => format!("terminal:{user}"),
        }
    }

    /// Firehose channel for a whole service (e.g. "service:worktrees").
    pub fn service(name: &str) -> String {
        format!("service:{name}")
    }
}

/// Metadata accompanying a streaming start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_tool_use_id: Option<String>,
}

/// Events that flow to channel subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- service CRUD --
    #[serde(rename = "service:created")]
    ServiceCreated { service: String, data: serde_json::Value },

    #[serde(rename = "service:patched")]
    ServicePatched { service: String, data: serde_json::Value },

    #[serde(rename = "service:updated")]
    ServiceUpdated { service: String, data: serde_json::Value },

    #[serde(rename = "service:removed")]
    ServiceRemoved { service: String, data: serde_json::Value },

    // -- streaming (per message_id: start < chunks < end | error) --
    #[serde(rename = "message:streaming:start")]
    StreamStart { session_id: SessionId, message_id: MessageId, meta: StreamMeta },

    #[serde(rename = "message:streaming:chunk")]
    StreamChunk { session_id: SessionId, message_id: MessageId, text: String },

    #[serde(rename = "message:streaming:end")]
    StreamEnd { session_id: SessionId, message_id: MessageId },

    #[serde(rename = "message:streaming:error")]
    StreamError { session_id: SessionId, message_id: MessageId, error: String },

    #[serde(rename = "message:thinking:start")]
    ThinkingStart { session_id: SessionId, message_id: MessageId },

    #[serde(rename = "message:thinking:chunk")]
    ThinkingChunk { session_id: SessionId, message_id: MessageId, text: String },

    #[serde(rename = "message:thinking:end")]
    ThinkingEnd { session_id: SessionId, message_id: MessageId },

    // -- task lifecycle --
    #[serde(rename = "task:status")]
    TaskStatusChanged { session_id: SessionId, task_id: TaskId, status: TaskStatus },

    /// Emitted after a stopped task's streaming has fully drained.
    #[serde(rename = "task:stopped:complete")]
    TaskStoppedComplete { session_id: SessionId, task_id: TaskId },

    /// A tool adapter surfaced a permission request.
    #[serde(rename = "task:permission:request")]
    PermissionRequest {
        session_id: SessionId,
        task_id: TaskId,
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<serde_json::Value>,
    },

    // -- session / worktree --
    #[serde(rename = "session:status")]
    SessionStatusChanged { session_id: SessionId, status: SessionStatus },

    #[serde(rename = "worktree:status")]
    WorktreeStatusChanged {
        worktree_id: WorktreeId,
        status: FilesystemStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<AgorError>,
    },

    // -- terminal --
    #[serde(rename = "terminal:output")]
    TerminalOutput { terminal_id: String, data: String },

    /// Client keystrokes routed to the PTY owner.
    #[serde(rename = "terminal:input")]
    TerminalInput { terminal_id: String, data: String },

    #[serde(rename = "terminal:resize")]
    TerminalResize { terminal_id: String, cols: u16, rows: u16 },

    #[serde(rename = "terminal:closed")]
    TerminalClosed { terminal_id: String },
}

impl Event {
    /// Channels this event is intrinsically addressed to.
    ///
    /// Service CRUD events return empty; the publishing service computes
    /// their channels from the entity payload.
    pub fn channels(&self) -> Vec<String> {
        match self {
            Event::StreamStart { session_id, .. }
            | Event::StreamChunk { session_id, .. }
            | Event::StreamEnd { session_id, .. }
            | Event::StreamError { session_id, .. }
            | Event::ThinkingStart { session_id, .. }
            | Event::ThinkingChunk { session_id, .. }
            | Event::ThinkingEnd { session_id, .. }
            | Event::TaskStatusChanged { session_id, .. }
            | Event::TaskStoppedComplete { session_id, .. }
            | Event::PermissionRequest { session_id, .. }
            | Event::SessionStatusChanged { session_id, .. } => {
                vec![channel::session(session_id)]
            }
            Event::WorktreeStatusChanged { worktree_id, .. } => {
                vec![channel::worktree(worktree_id), channel::service("worktrees")]
            }
            Event::TerminalOutput { terminal_id, .. }
            | Event::TerminalInput { terminal_id, .. }
            | Event::TerminalResize { terminal_id, .. }
            | Event::TerminalClosed { terminal_id } => {
                vec![format!("terminal:{terminal_id}")]
            }
            Event::ServiceCreated { .. }
            | Event::ServicePatched { .. }
            | Event::ServiceUpdated { .. }
            | Event::ServiceRemoved { .. } => Vec::new(),
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::ServiceCreated { .. } => "service:created",
            Event::ServicePatched { .. } => "service:patched",
            Event::ServiceUpdated { .. } => "service:updated",
            Event::ServiceRemoved { .. } => "service:removed",
            Event::StreamStart { .. } => "message:streaming:start",
            Event::StreamChunk { .. } => "message:streaming:chunk",
            Event::StreamEnd { .. } => "message:streaming:end",
            Event::StreamError { .. } => "message:streaming:error",
            Event::ThinkingStart { .. } => "message:thinking:start",
            Event::ThinkingChunk { .. } => "message:thinking:chunk",
            Event::ThinkingEnd { .. } => "message:thinking:end",
            Event::TaskStatusChanged { .. } => "task:status",
            Event::TaskStoppedComplete { .. } => "task:stopped:complete",
            Event::PermissionRequest { .. } => "task:permission:request",
            Event::SessionStatusChanged { .. } => "session:status",
            Event::WorktreeStatusChanged { .. } => "worktree:status",
            Event::TerminalOutput { .. } => "terminal:output",
            Event::TerminalInput { .. } => "terminal:input",
            Event::TerminalResize { .. } => "terminal:resize",
            Event::TerminalClosed { .. } => "terminal:closed",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
