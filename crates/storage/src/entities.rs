// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`Entity`] implementations binding domain types to storage tables.

use crate::mutation::Table;
use crate::state::MaterializedState;
use agor_core::{AgorError, ErrorKind};
use agor_core::{
    Board, BoardComment, BoardObject, GatewayChannel, McpServer, Message, Repo, Session,
    SessionMcpServer, Task, ThreadSessionMap, User, Worktree, WorktreeOwner,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A record type stored in one table of the relational contract.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + 'static {
    const TABLE: Table;

    /// Whether patches bump an `updated_at` field.
    const HAS_UPDATED_AT: bool = true;

    /// Primary key (or composite key) of this record.
    fn key(&self) -> String;

    /// UNIQUE-constraint check against current state. `key` is the
    /// record's own key so updates don't collide with themselves.
    fn unique_conflict(_state: &MaterializedState, _record: &Self, _key: &str) -> Option<AgorError> {
        None
    }
}

/// Scan `table` for another record whose `field` equals `value`.
fn field_taken(
    state: &MaterializedState,
    table: Table,
    field: &str,
    value: &Value,
    own_key: &str,
) -> bool {
    state.table(table).is_some_and(|rows| {
        rows.iter().any(|(key, record)| key != own_key && record.get(field) == Some(value))
    })
}

fn conflict(what: &str, value: impl std::fmt::Display) -> AgorError {
    AgorError::new(ErrorKind::Conflict, format!("{what} {value} already exists"))
}

impl Entity for User {
    const TABLE: Table = Table::Users;

    fn key(&self) -> String {
        self.user_id.to_string()
    }

    fn unique_conflict(state: &MaterializedState, record: &Self, key: &str) -> Option<AgorError> {
        let email = Value::String(record.email.clone());
        field_taken(state, Table::Users, "email", &email, key)
            .then(|| conflict("user with email", &record.email))
    }
}

impl Entity for Repo {
    const TABLE: Table = Table::Repos;

    fn key(&self) -> String {
        self.repo_id.to_string()
    }

    fn unique_conflict(state: &MaterializedState, record: &Self, key: &str) -> Option<AgorError> {
        let slug = Value::String(record.slug.clone());
        field_taken(state, Table::Repos, "slug", &slug, key)
            .then(|| conflict("repo with slug", &record.slug))
    }
}

impl Entity for Worktree {
    const TABLE: Table = Table::Worktrees;

    fn key(&self) -> String {
        self.worktree_id.to_string()
    }

    fn unique_conflict(state: &MaterializedState, record: &Self, key: &str) -> Option<AgorError> {
        let rows = state.table(Table::Worktrees)?;
        let repo = Value::String(record.repo_id.to_string());
        for (other_key, other) in rows {
            if other_key == key || other.get("repo_id") != Some(&repo) {
                continue;
            }
            if other.get("name").and_then(Value::as_str) == Some(record.name.as_str()) {
                return Some(conflict("worktree named", &record.name));
            }
            if other.get("worktree_unique_id").and_then(Value::as_u64)
                == Some(record.worktree_unique_id as u64)
            {
                return Some(conflict("worktree unique id", record.worktree_unique_id));
            }
        }
        None
    }
}

impl Entity for WorktreeOwner {
    const TABLE: Table = Table::WorktreeOwners;
    const HAS_UPDATED_AT: bool = false;

    fn key(&self) -> String {
        WorktreeOwner::key(&self.worktree_id, &self.user_id)
    }
}

impl Entity for Board {
    const TABLE: Table = Table::Boards;

    fn key(&self) -> String {
        self.board_id.to_string()
    }
}

impl Entity for BoardObject {
    const TABLE: Table = Table::BoardObjects;

    fn key(&self) -> String {
        self.object_id.clone()
    }
}

impl Entity for BoardComment {
    const TABLE: Table = Table::BoardComments;
    const HAS_UPDATED_AT: bool = false;

    fn key(&self) -> String {
        self.comment_id.clone()
    }
}

impl Entity for Session {
    const TABLE: Table = Table::Sessions;

    fn key(&self) -> String {
        self.session_id.to_string()
    }
}

impl Entity for Task {
    const TABLE: Table = Table::Tasks;

    fn key(&self) -> String {
        self.task_id.to_string()
    }
}

impl Entity for Message {
    const TABLE: Table = Table::Messages;
    const HAS_UPDATED_AT: bool = false;

    fn key(&self) -> String {
        self.message_id.to_string()
    }
}

impl Entity for McpServer {
    const TABLE: Table = Table::McpServers;

    fn key(&self) -> String {
        self.mcp_server_id.to_string()
    }

    fn unique_conflict(state: &MaterializedState, record: &Self, key: &str) -> Option<AgorError> {
        let name = Value::String(record.name.clone());
        field_taken(state, Table::McpServers, "name", &name, key)
            .then(|| conflict("MCP server named", &record.name))
    }
}

impl Entity for SessionMcpServer {
    const TABLE: Table = Table::SessionMcpServers;
    const HAS_UPDATED_AT: bool = false;

    fn key(&self) -> String {
        SessionMcpServer::key(&self.session_id, &self.mcp_server_id)
    }
}

impl Entity for GatewayChannel {
    const TABLE: Table = Table::GatewayChannels;

    fn key(&self) -> String {
        self.channel_id.to_string()
    }
}

impl Entity for ThreadSessionMap {
    const TABLE: Table = Table::ThreadSessionMaps;
    const HAS_UPDATED_AT: bool = false;

    fn key(&self) -> String {
        ThreadSessionMap::key(&self.channel_id, &self.thread_id)
    }
}
