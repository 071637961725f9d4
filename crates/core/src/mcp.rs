// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registered MCP servers and their session attachments.

use crate::id::{McpServerId, SessionId, UserId};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransport {
    Stdio,
    Http,
    Sse,
}

crate::simple_display! {
    McpTransport {
        Stdio => "stdio",
        Http => "http",
        Sse => "sse",
    }
}

/// A registered MCP endpoint available for session attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServer {
    pub mcp_server_id: McpServerId,
    pub name: String,
    pub transport: McpTransport,
    /// Command line for stdio transport; URL for http/sse.
    pub target: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attachment of an MCP server to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMcpServer {
    pub session_id: SessionId,
    pub mcp_server_id: McpServerId,
    #[serde(default)]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionMcpServer {
    pub fn key(session_id: &SessionId, mcp_server_id: &McpServerId) -> String {
        format!("{session_id}:{mcp_server_id}")
    }
}
