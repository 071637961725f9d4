// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registered git repositories.

use crate::id::{RepoId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A cloned repository registered with the daemon.
///
/// `slug` is the unique `org/name` form; the clone lives at
/// `<data>/repos/<slug>/` and worktrees under `<data>/worktrees/<slug>/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub repo_id: RepoId,
    pub slug: String,
    pub remote_url: String,
    pub local_path: PathBuf,
    pub default_branch: String,
    /// Unix group gating `.git/` access when RBAC is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unix_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
    /// High-water mark for `worktree_unique_id` allocation in this repo.
    #[serde(default)]
    pub next_worktree_unique_id: u16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repo {
    /// Validate an `org/name` slug.
    pub fn is_valid_slug(slug: &str) -> bool {
        let mut parts = slug.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(org), Some(name), None) => {
                !org.is_empty()
                    && !name.is_empty()
                    && slug
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.'))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "repo_tests.rs"]
mod tests;
