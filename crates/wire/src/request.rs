// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Requests from clients (CLI, web, executors) to the daemon.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One framed request.
///
/// Service verbs address services by name; `id` fields accept full IDs
/// or unambiguous short-ID prefixes. `Call` reaches custom routes such
/// as `sessions/:id/prompt`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version + auth handshake. `token` is a JWT from login or an
    /// executor session token; omitted for the anonymous strategy.
    Hello {
        version: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Exchange credentials for a JWT.
    Login { email: String, password: String },

    /// `find` verb: list records matching a query.
    Find {
        service: String,
        #[serde(default)]
        query: Value,
    },

    /// `get` verb: fetch one record by ID (or short-ID prefix).
    Get { service: String, id: String },

    /// `create` verb.
    Create { service: String, data: Value },

    /// `patch` verb: deep-merge `data` into the record.
    Patch { service: String, id: String, data: Value },

    /// `remove` verb.
    Remove { service: String, id: String },

    /// Custom route, e.g. `Call{service:"sessions", route:"prompt", id:Some(..)}`.
    Call {
        service: String,
        route: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        params: Value,
    },

    /// Subscribe this connection to event channels.
    Subscribe { channels: Vec<String> },

    /// Drop channels from this connection's subscription set.
    Unsubscribe { channels: Vec<String> },

    /// Get daemon status
    Status,

    /// Request daemon shutdown
    Shutdown,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
