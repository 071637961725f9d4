// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tasks: single agent turns with git state and token accounting.

use crate::id::{SessionId, TaskId};
use crate::usage::NormalizedUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task status. `Pending`, `Running`, and `AwaitingPermission` are the
/// non-terminal states; at most one task per session may occupy them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    AwaitingPermission,
    Completed,
    Failed,
    Stopped,
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Running => "running",
        AwaitingPermission => "awaiting_permission",
        Completed => "completed",
        Failed => "failed",
        Stopped => "stopped",
    }
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Stopped)
    }
}

/// Git SHA captured at a task boundary.
///
/// `"unknown"` when capture failed; a `-dirty` suffix marks uncommitted
/// changes in the working tree.
pub const GIT_SHA_UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha_at_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha_at_end: Option<String>,
}

/// Contiguous index range of a task's messages within the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRange {
    pub start_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<u64>,
}

/// Truncation length for the derived task description.
const DESCRIPTION_LEN: usize = 80;

/// A single agent turn triggered by a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub session_id: SessionId,
    pub status: TaskStatus,
    pub full_prompt: String,
    /// First line of the prompt, truncated for listings.
    pub description: String,
    #[serde(default)]
    pub message_range: MessageRange,
    #[serde(default)]
    pub tool_use_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(default)]
    pub git_state: GitState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_sdk_response: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_sdk_response: Option<NormalizedUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_context_window: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<crate::error::AgorError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Derive the listing description from a prompt.
    pub fn describe(prompt: &str) -> String {
        let first_line = prompt.lines().next().unwrap_or_default();
        if first_line.len() <= DESCRIPTION_LEN {
            first_line.to_string()
        } else {
            let mut end = DESCRIPTION_LEN;
            while !first_line.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}…", &first_line[..end])
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
