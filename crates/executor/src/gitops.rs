// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git actions: clone, worktree add/remove, prune.

use agor_core::{AgorError, ErrorKind, FilesystemStatus};
use agor_wire::{
    DaemonClient, GitCloneParams, WorktreeAddParams, WorktreeCleanParams, WorktreeRemoveParams,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Clones can pull large repos over slow links.
const CLONE_TIMEOUT: Duration = Duration::from_secs(600);
const WORKTREE_TIMEOUT: Duration = Duration::from_secs(60);

async fn git(args: &[&str], cwd: Option<&Path>, timeout: Duration) -> Result<String, AgorError> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    let output = agor_adapters::subprocess::run_with_timeout(cmd, timeout, "git")
        .await
        .map_err(|e| AgorError::new(ErrorKind::GitError, format!("git {args:?}: {e}")))?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(AgorError::new(
            ErrorKind::GitError,
            format!(
                "git {} failed (exit {}): {}",
                args.first().unwrap_or(&""),
                output.status.code().unwrap_or(-1),
                agor_adapters::subprocess::stderr_summary(&output)
            ),
        ))
    }
}

pub async fn clone(
    client: Arc<DaemonClient>,
    params: GitCloneParams,
) -> Result<Option<Value>, AgorError> {
    if let Some(parent) = params.local_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AgorError::new(ErrorKind::FilesystemError, e.to_string()))?;
    }
    let local = params.local_path.to_string_lossy().into_owned();
    let mut args = vec!["clone", params.remote_url.as_str(), local.as_str()];
    if let Some(branch) = &params.default_branch {
        args.extend_from_slice(&["--branch", branch.as_str()]);
    }
    git(&args, None, CLONE_TIMEOUT).await?;
    info!(repo = %params.repo_id, path = %local, "repo cloned");

    client
        .patch(
            "repos",
            params.repo_id.as_str(),
            json!({"local_path": params.local_path}),
        )
        .await
        .map_err(|e| AgorError::new(ErrorKind::NetworkError, e.to_string()))?;
    Ok(Some(json!({"local_path": params.local_path})))
}

pub async fn worktree_add(
    client: Arc<DaemonClient>,
    params: WorktreeAddParams,
) -> Result<Option<Value>, AgorError> {
    let result = add_inner(&client, &params).await;
    match result {
        Ok(()) => {
            client
                .patch(
                    "worktrees",
                    params.worktree_id.as_str(),
                    json!({"filesystem_status": FilesystemStatus::Ready, "last_error": null}),
                )
                .await
                .map_err(|e| AgorError::new(ErrorKind::NetworkError, e.to_string()))?;
            Ok(Some(json!({"path": params.worktree_path})))
        }
        Err(e) => {
            let patch = json!({
                "filesystem_status": FilesystemStatus::Failed,
                "last_error": e.message,
            });
            if let Err(patch_err) =
                client.patch("worktrees", params.worktree_id.as_str(), patch).await
            {
                warn!(error = %patch_err, "failed-state patch did not reach the daemon");
            }
            Err(e)
        }
    }
}

async fn add_inner(client: &Arc<DaemonClient>, params: &WorktreeAddParams) -> Result<(), AgorError> {
    if let Some(parent) = params.worktree_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| AgorError::new(ErrorKind::FilesystemError, e.to_string()))?;
    }
    let path = params.worktree_path.to_string_lossy().into_owned();
    let mut args: Vec<&str> = vec!["worktree", "add"];
    if params.create_branch {
        args.push("-b");
        if let Some(branch) = &params.branch {
            args.push(branch.as_str());
        }
    }
    args.push(&path);
    match (params.create_branch, &params.source_branch, &params.branch) {
        (true, Some(source), _) => args.push(source.as_str()),
        (false, _, Some(branch)) => args.push(branch.as_str()),
        _ => {}
    }
    git(&args, Some(&params.repo_path), WORKTREE_TIMEOUT).await?;

    if params.init_unix_group {
        crate::unixops::sync_worktree_by_id(client, params.worktree_id.as_str(), false).await?;
    }
    Ok(())
}

pub async fn worktree_remove(
    client: Arc<DaemonClient>,
    params: WorktreeRemoveParams,
) -> Result<Option<Value>, AgorError> {
    // The sync view must be fetched while the row still exists.
    let sync_view = crate::unixops::fetch_sync_view(
        &client,
        "worktrees",
        params.worktree_id.as_str(),
        json!({"delete": true}),
    )
    .await
    .ok();

    let path = params.worktree_path.to_string_lossy().into_owned();
    let mut args = vec!["worktree", "remove"];
    if params.force {
        args.push("--force");
    }
    args.push(&path);
    if let Err(e) = git(&args, Some(&params.repo_path), WORKTREE_TIMEOUT).await {
        // Fall back to a plain removal; prune cleans the registration.
        warn!(error = %e, "git worktree remove failed; removing directory");
        std::fs::remove_dir_all(&params.worktree_path)
            .map_err(|e| AgorError::new(ErrorKind::FilesystemError, e.to_string()))?;
        git(&["worktree", "prune"], Some(&params.repo_path), WORKTREE_TIMEOUT).await?;
    }

    client
        .remove("worktrees", params.worktree_id.as_str())
        .await
        .map_err(|e| AgorError::new(ErrorKind::NetworkError, e.to_string()))?;

    if let Some((runner, view)) = sync_view {
        agor_engine::unix_sync::sync_worktree(runner.as_ref(), &view, true).await?;
    }
    Ok(None)
}

pub async fn worktree_clean(params: WorktreeCleanParams) -> Result<Option<Value>, AgorError> {
    git(&["worktree", "prune"], Some(&params.repo_path), WORKTREE_TIMEOUT).await?;
    Ok(None)
}
