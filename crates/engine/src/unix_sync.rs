// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional Unix sync protocols.
//!
//! These run inside the executor process against views the daemon
//! resolved from the store. Every protocol is idempotent: running it
//! twice back to back yields identical group membership, ACLs, and
//! symlinks. Group membership is eventually consistent and safe to
//! retry at any time.

use agor_adapters::unix::{ops, UnixRunner};
use agor_core::{AgorError, OthersFsAccess, AGOR_USERS_GROUP};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Everything `unix.sync-worktree` needs, resolved by the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorktreeSyncView {
    pub group: String,
    pub path: PathBuf,
    pub worktree_name: String,
    /// Unix usernames of current owners.
    pub owners: Vec<String>,
    pub daemon_user: Option<String>,
    pub others_fs_access: OthersFsAccess,
    /// `<repo>/.git/worktrees/<name>` metadata directory.
    pub git_metadata_dir: Option<PathBuf>,
    /// Home directory per owner (for `~/agor/<name>` symlinks).
    pub owner_homes: Vec<(String, PathBuf)>,
}

/// Everything `unix.sync-repo` needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSyncView {
    pub group: String,
    pub local_path: PathBuf,
    /// Users who hold worktrees of this repo (plus the daemon).
    pub members: Vec<String>,
    pub daemon_user: Option<String>,
}

/// Everything `unix.sync-user` needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSyncView {
    pub username: String,
    pub shell: String,
    pub home: PathBuf,
    /// `(worktree name, worktree path)` for every owned worktree.
    pub owned_worktrees: Vec<(String, PathBuf)>,
}

/// Ensure (or tear down) a worktree's group, ACLs, and symlinks.
pub async fn sync_worktree(
    runner: &dyn UnixRunner,
    view: &WorktreeSyncView,
    delete: bool,
) -> Result<(), AgorError> {
    if delete {
        for (_owner, home) in &view.owner_homes {
            ops::remove_path(runner, &home.join("agor").join(&view.worktree_name)).await?;
        }
        ops::remove_group(runner, &view.group).await?;
        info!(group = %view.group, "worktree unix state removed");
        return Ok(());
    }

    ops::ensure_group(runner, &view.group).await?;
    ops::chgrp_recursive(runner, &view.group, &view.path).await?;
    // Owners get full group access; the setgid bit keeps new files in
    // the group. World access stays closed — broader visibility rides
    // on the agor_users ACL below.
    ops::chmod(runner, "2770", &view.path).await?;
    ops::set_group_acl(runner, AGOR_USERS_GROUP, &view.path, view.others_fs_access).await?;

    let mut members: Vec<&str> = view.owners.iter().map(String::as_str).collect();
    if let Some(daemon_user) = &view.daemon_user {
        members.push(daemon_user);
    }
    for member in members {
        ops::ensure_member(runner, &view.group, member).await?;
    }

    // The worktree's metadata dir under the repo's .git must be
    // group-writable or `git status` inside the worktree fails.
    if let Some(git_dir) = &view.git_metadata_dir {
        ops::chgrp_recursive(runner, &view.group, git_dir).await?;
        ops::chmod(runner, "2770", git_dir).await?;
    }

    for (_owner, home) in &view.owner_homes {
        ops::ensure_symlink(runner, &view.path, &home.join("agor").join(&view.worktree_name))
            .await?;
    }

    Ok(())
}

/// Ensure (or tear down) a repo's group gating `.git` access.
pub async fn sync_repo(
    runner: &dyn UnixRunner,
    view: &RepoSyncView,
    delete: bool,
) -> Result<(), AgorError> {
    if delete {
        ops::remove_group(runner, &view.group).await?;
        return Ok(());
    }

    ops::ensure_group(runner, &view.group).await?;
    ops::chgrp_recursive(runner, &view.group, &view.local_path).await?;
    ops::chmod(runner, "2770", &view.local_path).await?;

    let mut members: Vec<&str> = view.members.iter().map(String::as_str).collect();
    if let Some(daemon_user) = &view.daemon_user {
        members.push(daemon_user);
    }
    for member in members {
        ops::ensure_member(runner, &view.group, member).await?;
    }
    Ok(())
}

/// Ensure (or tear down) a managed user account.
pub async fn sync_user(
    runner: &dyn UnixRunner,
    view: &UserSyncView,
    password: Option<&str>,
    delete: bool,
    delete_home: bool,
) -> Result<(), AgorError> {
    if delete {
        ops::remove_user(runner, &view.username, delete_home).await?;
        info!(user = %view.username, "unix account removed");
        return Ok(());
    }

    ops::ensure_user(runner, &view.username, &view.shell).await?;
    ops::ensure_group(runner, AGOR_USERS_GROUP).await?;
    ops::ensure_member(runner, AGOR_USERS_GROUP, &view.username).await?;
    if let Some(password) = password {
        ops::set_password(runner, &view.username, password).await?;
    }
    for (name, path) in &view.owned_worktrees {
        ops::ensure_symlink(runner, path, &view.home.join("agor").join(name)).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "unix_sync_tests.rs"]
mod tests;
