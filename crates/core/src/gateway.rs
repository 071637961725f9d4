// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway channels binding external chat threads to worktrees.

use crate::id::{ChannelId, SessionId, UserId, WorktreeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured binding between a chat platform namespace and a worktree.
///
/// `channel_key_hash` is the sha256 fingerprint of the shared secret the
/// platform presents on inbound posts; the plaintext key is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayChannel {
    pub channel_id: ChannelId,
    /// Platform discriminator, e.g. "slack" or "telegram".
    pub channel_type: String,
    pub channel_key_hash: String,
    /// Owner whose identity inbound sessions run under.
    pub agor_user_id: UserId,
    pub target_worktree_id: WorktreeId,
    #[serde(default)]
    pub enabled: bool,
    /// Connector config; an `app_token` key enables push-mode listening.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agentic_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GatewayChannel {
    /// True when this channel should have a push-mode listener running.
    pub fn wants_push_listener(&self) -> bool {
        self.enabled
            && self
                .config
                .as_ref()
                .and_then(|c| c.get("app_token"))
                .and_then(|t| t.as_str())
                .is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    #[default]
    Active,
    Archived,
}

/// Mapping from a platform thread to the session answering it.
///
/// Functional in `(channel_id, thread_id)`: one mapping per thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSessionMap {
    pub channel_id: ChannelId,
    pub thread_id: String,
    pub session_id: SessionId,
    #[serde(default)]
    pub status: ThreadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ThreadSessionMap {
    pub fn key(channel_id: &ChannelId, thread_id: &str) -> String {
        format!("{channel_id}:{thread_id}")
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
