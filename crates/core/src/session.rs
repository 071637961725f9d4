// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sessions: long-running conversations between one agent tool and one worktree.

use crate::id::{SessionId, TaskId, UserId, WorktreeId};
use crate::task::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The agent SDKs a session can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgenticTool {
    #[serde(rename = "claude-code")]
    ClaudeCode,
    #[serde(rename = "codex")]
    Codex,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "opencode")]
    Opencode,
}

crate::simple_display! {
    AgenticTool {
        ClaudeCode => "claude-code",
        Codex => "codex",
        Gemini => "gemini",
        Opencode => "opencode",
    }
}

impl AgenticTool {
    pub const ALL: [AgenticTool; 4] =
        [AgenticTool::ClaudeCode, AgenticTool::Codex, AgenticTool::Gemini, AgenticTool::Opencode];

    /// Whether this tool's SDK reports cumulative token usage per turn.
    pub fn reports_cumulative_usage(&self) -> bool {
        matches!(self, AgenticTool::Codex)
    }

    /// The subset of the permission-mode union this tool accepts.
    ///
    /// A session's `permission_config.mode` must stay inside this set.
    pub fn supported_permission_modes(&self) -> &'static [PermissionMode] {
        match self {
            AgenticTool::ClaudeCode => &[
                PermissionMode::Default,
                PermissionMode::Plan,
                PermissionMode::AcceptEdits,
                PermissionMode::BypassPermissions,
            ],
            AgenticTool::Codex => {
                &[PermissionMode::ReadOnly, PermissionMode::Auto, PermissionMode::FullAccess]
            }
            AgenticTool::Gemini => &[
                PermissionMode::Default,
                PermissionMode::AcceptEdits,
                PermissionMode::BypassPermissions,
            ],
            AgenticTool::Opencode => &[PermissionMode::Default, PermissionMode::AcceptEdits],
        }
    }

    pub fn supports_mode(&self, mode: PermissionMode) -> bool {
        self.supported_permission_modes().contains(&mode)
    }

    /// Conservative default mode for a fresh session.
    pub fn default_permission_mode(&self) -> PermissionMode {
        match self {
            AgenticTool::Codex => PermissionMode::ReadOnly,
            _ => PermissionMode::Default,
        }
    }
}

/// Union of permission modes across all tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    Default,
    Plan,
    AcceptEdits,
    BypassPermissions,
    ReadOnly,
    Auto,
    FullAccess,
}

crate::simple_display! {
    PermissionMode {
        Default => "default",
        Plan => "plan",
        AcceptEdits => "acceptEdits",
        BypassPermissions => "bypassPermissions",
        ReadOnly => "readOnly",
        Auto => "auto",
        FullAccess => "fullAccess",
    }
}

/// Codex-specific sandbox knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodexPermissionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_access: Option<bool>,
}

/// Permission configuration carried by a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionConfig {
    pub mode: PermissionMode,
    /// Tools pre-approved at `session` scope by decision responses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codex: Option<CodexPermissionConfig>,
}

impl PermissionConfig {
    pub fn for_tool(tool: AgenticTool) -> Self {
        Self { mode: tool.default_permission_mode(), allowed_tools: Vec::new(), codex: None }
    }
}

/// Model selection carried by a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<String>,
}

/// Session status, derived from task states (never set directly).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    AwaitingPermission,
    Completed,
    Failed,
}

crate::simple_display! {
    SessionStatus {
        Idle => "idle",
        Running => "running",
        AwaitingPermission => "awaiting_permission",
        Completed => "completed",
        Failed => "failed",
    }
}

impl SessionStatus {
    /// Derive the session status from its most recent task statuses.
    ///
    /// `running` iff some task is running or awaiting permission; otherwise
    /// mirrors the most recent terminal task, or `idle` with no history.
    pub fn derive(latest_task: Option<TaskStatus>, any_active: bool, awaiting: bool) -> Self {
        if awaiting {
            return SessionStatus::AwaitingPermission;
        }
        if any_active {
            return SessionStatus::Running;
        }
        match latest_task {
            Some(TaskStatus::Completed) | Some(TaskStatus::Stopped) => SessionStatus::Completed,
            Some(TaskStatus::Failed) => SessionStatus::Failed,
            _ => SessionStatus::Idle,
        }
    }
}

/// Where a session came from (forks and gateway threads).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Genealogy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked_from_session_id: Option<SessionId>,
}

/// A long-running conversation with one agent tool against one worktree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub worktree_id: WorktreeId,
    pub created_by: UserId,
    /// Snapshot of the creator's `unix_username` at creation time;
    /// later user edits do not rewrite existing sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unix_username: Option<String>,
    pub agentic_tool: AgenticTool,
    pub permission_config: PermissionConfig,
    #[serde(default)]
    pub model_config: ModelConfig,
    #[serde(default)]
    pub status: SessionStatus,
    /// Task IDs in strict creation order.
    #[serde(default)]
    pub tasks: Vec<TaskId>,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub genealogy: Genealogy,
    /// Free-form denormalized context (e.g. gateway source metadata).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_context: Option<serde_json::Value>,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
