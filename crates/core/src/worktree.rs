// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktrees: git working trees with optional Unix-group isolation.

use crate::id::{BoardId, RepoId, UserId, WorktreeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefType {
    Branch,
    Tag,
    Sha,
}

crate::simple_display! {
    RefType {
        Branch => "branch",
        Tag => "tag",
        Sha => "sha",
    }
}

/// On-disk lifecycle of a worktree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilesystemStatus {
    Creating,
    Ready,
    Failed,
    Removed,
}

crate::simple_display! {
    FilesystemStatus {
        Creating => "creating",
        Ready => "ready",
        Failed => "failed",
        Removed => "removed",
    }
}

/// What non-owners may do with a worktree through the service layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OthersCan {
    #[default]
    None,
    View,
    Prompt,
    All,
}

crate::simple_display! {
    OthersCan {
        None => "none",
        View => "view",
        Prompt => "prompt",
        All => "all",
    }
}

/// Filesystem access granted to non-owners via group ACLs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OthersFsAccess {
    #[default]
    None,
    Read,
    Write,
}

crate::simple_display! {
    OthersFsAccess {
        None => "none",
        Read => "read",
        Write => "write",
    }
}

/// A git working tree derived from a repo, mounted at a stable path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worktree {
    pub worktree_id: WorktreeId,
    pub repo_id: RepoId,
    pub name: String,
    /// The ref this worktree was created from.
    pub ref_name: String,
    pub ref_type: RefType,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_ref: Option<String>,
    /// True when `ref_name` was created as a fresh branch off `base_ref`.
    #[serde(default)]
    pub new_branch: bool,
    /// Per-repo monotonic small integer used to derive deterministic
    /// host ports. Never reused.
    pub worktree_unique_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_id: Option<BoardId>,
    pub created_by: UserId,
    pub filesystem_status: FilesystemStatus,
    #[serde(default)]
    pub others_can: OthersCan,
    #[serde(default)]
    pub others_fs_access: OthersFsAccess,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unix_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_instance: Option<serde_json::Value>,
    /// Failure detail from the last create/sync attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Junction row granting a user ownership of a worktree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeOwner {
    pub worktree_id: WorktreeId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl WorktreeOwner {
    /// Composite key used as the storage table key.
    pub fn key(worktree_id: &WorktreeId, user_id: &UserId) -> String {
        format!("{worktree_id}:{user_id}")
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
