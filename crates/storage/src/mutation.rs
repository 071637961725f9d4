// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed mutation records — the unit of WAL persistence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entity tables of the relational contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Users,
    Repos,
    Worktrees,
    WorktreeOwners,
    Boards,
    BoardObjects,
    BoardComments,
    Sessions,
    Tasks,
    Messages,
    McpServers,
    SessionMcpServers,
    GatewayChannels,
    ThreadSessionMaps,
}

agor_core::simple_display! {
    Table {
        Users => "users",
        Repos => "repos",
        Worktrees => "worktrees",
        WorktreeOwners => "worktree_owners",
        Boards => "boards",
        BoardObjects => "board_objects",
        BoardComments => "board_comments",
        Sessions => "sessions",
        Tasks => "tasks",
        Messages => "messages",
        McpServers => "mcp_servers",
        SessionMcpServers => "session_mcp_servers",
        GatewayChannels => "gateway_channels",
        ThreadSessionMaps => "thread_session_maps",
    }
}

/// One durable state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Insert or replace a record wholesale.
    Put { table: Table, key: String, record: Value },
    /// Deep-merge a partial record.
    Patch { table: Table, key: String, patch: Value },
    Remove { table: Table, key: String },
}

impl Mutation {
    pub fn table(&self) -> Table {
        match self {
            Mutation::Put { table, .. }
            | Mutation::Patch { table, .. }
            | Mutation::Remove { table, .. } => *table,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Mutation::Put { key, .. }
            | Mutation::Patch { key, .. }
            | Mutation::Remove { key, .. } => key,
        }
    }
}
