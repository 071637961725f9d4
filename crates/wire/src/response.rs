// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responses and event pushes from the daemon.

use agor_core::{AgorError, Event};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User identity attached to a login response (secret fields stripped).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginUser {
    pub user_id: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub must_change_password: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime_secs: u64,
    pub sessions_active: usize,
    pub executors_running: usize,
    #[serde(default)]
    pub push_listeners: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Login succeeded.
    Authenticated { access_token: String, user: LoginUser, expires_at: i64 },

    /// Result of `get`/`create`/`patch`/`remove`/custom calls.
    Record { data: Value },

    /// Result of `find`.
    Records { data: Vec<Value>, total: usize },

    /// Channel subscription confirmed.
    Subscribed { channels: Vec<String> },

    /// Pushed event for subscribed channels.
    Event { channels: Vec<String>, event: Event },

    /// Daemon status
    Status { status: DaemonStatus },

    /// Daemon is shutting down
    ShuttingDown,

    /// Error response
    Error { error: AgorError },
}

impl Response {
    pub fn error(error: AgorError) -> Self {
        Response::Error { error }
    }

    pub fn record(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Response::Record { data },
            Err(e) => Response::Error {
                error: AgorError::new(
                    agor_core::ErrorKind::ValidationFailed,
                    format!("response serialization failed: {e}"),
                ),
            },
        }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
