// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor subprocess payloads.
//!
//! Each privileged action is an RPC over the executor's stdin: a tagged
//! union over `command` with command-specific `params`. Parsing is
//! strict — unknown fields anywhere reject the payload. Secrets ride in
//! the payload body, never in argv. Impersonation is deliberately absent
//! here: the daemon picks the Unix user at spawn time.

use agor_core::{
    AgenticTool, AgorError, ChannelId, OthersFsAccess, PermissionMode, RepoId, SessionId, TaskId,
    UserId, WorktreeId,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Envelope fields allowed at the top level of a payload.
const ENVELOPE_KEYS: [&str; 6] = ["command", "params", "sessionToken", "daemonUrl", "env", "dataHome"];

/// The complete stdin payload for one executor invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorPayload {
    #[serde(flatten)]
    pub action: ExecutorAction,
    /// JWT authenticating the executor back to the daemon.
    pub session_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_home: Option<PathBuf>,
}

impl ExecutorPayload {
    pub fn new(action: ExecutorAction, session_token: impl Into<String>) -> Self {
        Self {
            action,
            session_token: session_token.into(),
            daemon_url: None,
            env: None,
            data_home: None,
        }
    }

    /// Strict parse: rejects unknown top-level fields (flattened enums
    /// swallow strays, so the envelope is checked against a closed key
    /// set first), then unknown params fields via serde.
    pub fn parse(bytes: &[u8]) -> Result<ExecutorPayload, AgorError> {
        let raw: Value = serde_json::from_slice(bytes)
            .map_err(|e| AgorError::validation(format!("malformed payload JSON: {e}")))?;
        let obj = raw
            .as_object()
            .ok_or_else(|| AgorError::validation("payload must be a JSON object"))?;
        for key in obj.keys() {
            if !ENVELOPE_KEYS.contains(&key.as_str()) {
                return Err(AgorError::validation(format!("unknown payload field {key:?}")));
            }
        }
        serde_json::from_value(raw)
            .map_err(|e| AgorError::validation(format!("invalid payload: {e}")))
    }

    /// The command tag, for logs.
    pub fn command(&self) -> &'static str {
        self.action.command()
    }
}

/// Closed set of executor commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "params")]
pub enum ExecutorAction {
    #[serde(rename = "prompt")]
    Prompt(PromptParams),
    #[serde(rename = "git.clone")]
    GitClone(GitCloneParams),
    #[serde(rename = "git.worktree.add")]
    WorktreeAdd(WorktreeAddParams),
    #[serde(rename = "git.worktree.remove")]
    WorktreeRemove(WorktreeRemoveParams),
    #[serde(rename = "git.worktree.clean")]
    WorktreeClean(WorktreeCleanParams),
    #[serde(rename = "unix.sync-worktree")]
    SyncWorktree(SyncWorktreeParams),
    #[serde(rename = "unix.sync-repo")]
    SyncRepo(SyncRepoParams),
    #[serde(rename = "unix.sync-user")]
    SyncUser(SyncUserParams),
    #[serde(rename = "zellij.attach")]
    ZellijAttach(ZellijAttachParams),
    #[serde(rename = "zellij.tab")]
    ZellijTab(ZellijTabParams),
}

impl ExecutorAction {
    pub fn command(&self) -> &'static str {
        match self {
            ExecutorAction::Prompt(_) => "prompt",
            ExecutorAction::GitClone(_) => "git.clone",
            ExecutorAction::WorktreeAdd(_) => "git.worktree.add",
            ExecutorAction::WorktreeRemove(_) => "git.worktree.remove",
            ExecutorAction::WorktreeClean(_) => "git.worktree.clean",
            ExecutorAction::SyncWorktree(_) => "unix.sync-worktree",
            ExecutorAction::SyncRepo(_) => "unix.sync-repo",
            ExecutorAction::SyncUser(_) => "unix.sync-user",
            ExecutorAction::ZellijAttach(_) => "zellij.attach",
            ExecutorAction::ZellijTab(_) => "zellij.tab",
        }
    }
}

/// Drive one agent turn against a worktree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PromptParams {
    pub session_id: SessionId,
    pub task_id: TaskId,
    pub tool: AgenticTool,
    pub prompt: String,
    pub cwd: PathBuf,
    /// Effective mode after session + user defaults are applied.
    pub permission_mode: PermissionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_tools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GitCloneParams {
    pub repo_id: RepoId,
    pub remote_url: String,
    pub local_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorktreeAddParams {
    pub worktree_id: WorktreeId,
    pub repo_id: RepoId,
    pub repo_path: PathBuf,
    pub worktree_name: String,
    pub worktree_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_branch: Option<String>,
    #[serde(default)]
    pub create_branch: bool,
    /// Create and apply the worktree Unix group as part of the add.
    #[serde(default)]
    pub init_unix_group: bool,
    #[serde(default)]
    pub others_access: OthersFsAccess,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_unix_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorktreeRemoveParams {
    pub worktree_id: WorktreeId,
    pub repo_path: PathBuf,
    pub worktree_path: PathBuf,
    #[serde(default)]
    pub force: bool,
}

/// Prune stale worktree registrations under a repo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorktreeCleanParams {
    pub repo_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncWorktreeParams {
    pub worktree_id: WorktreeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_user: Option<String>,
    #[serde(default)]
    pub delete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncRepoParams {
    pub repo_id: RepoId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_user: Option<String>,
    #[serde(default)]
    pub delete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncUserParams {
    pub user_id: UserId,
    /// Plaintext password delivered via stdin only; applied with chpasswd.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub delete_home: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalMode {
    #[default]
    Zellij,
    Shell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ZellijAttachParams {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_id: Option<WorktreeId>,
    pub session_name: String,
    pub cwd: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_name: Option<String>,
    pub cols: u16,
    pub rows: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<PathBuf>,
    #[serde(default)]
    pub mode: TerminalMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ZellijTabParams {
    pub session_name: String,
    pub tab_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

/// Error surfaced in an [`ExecutorResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<AgorError> for ExecutorError {
    fn from(err: AgorError) -> Self {
        Self { code: err.kind.code(), message: err.message, details: err.details }
    }
}

/// Written to stdout as the executor's final line of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutorError>,
}

impl ExecutorResult {
    pub fn ok(data: Option<Value>) -> Self {
        Self { success: true, data, error: None }
    }

    pub fn err(error: impl Into<ExecutorError>) -> Self {
        Self { success: false, data: None, error: Some(error.into()) }
    }
}

/// Thread routing metadata for gateway inbound posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessage {
    pub channel_key: String,
    pub thread_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Channel identity resolved after gateway authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayDispatch {
    pub channel_id: ChannelId,
    pub session_id: SessionId,
    pub created: bool,
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
