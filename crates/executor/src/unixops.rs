// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix sync actions.
//!
//! The daemon resolves each sync view (group names, owners, paths) and
//! tells us which runner class applies; the sync protocols themselves
//! live in the engine and are shared with tests.

use agor_adapters::{NoopRunner, SudoRunner, SystemRunner, UnixRunner};
use agor_core::{AgorError, ErrorKind};
use agor_engine::unix_sync;
use agor_wire::{DaemonClient, SyncRepoParams, SyncUserParams, SyncWorktreeParams};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Fetch `<service>/:id/sync-view` → (runner, typed view).
pub(crate) async fn fetch_sync_view<T: serde::de::DeserializeOwned>(
    client: &Arc<DaemonClient>,
    service: &str,
    id: &str,
    params: Value,
) -> Result<(Box<dyn UnixRunner>, T), AgorError> {
    let response = client
        .call(service, "sync-view", Some(id), params)
        .await
        .map_err(|e| AgorError::new(ErrorKind::NetworkError, e.to_string()))?;
    let runner = runner_from(response.get("runner").and_then(Value::as_str).unwrap_or("noop"));
    let view: T = serde_json::from_value(
        response.get("view").cloned().unwrap_or(Value::Null),
    )
    .map_err(|e| {
        AgorError::new(ErrorKind::ValidationFailed, format!("malformed sync view: {e}"))
    })?;
    Ok((runner, view))
}

fn runner_from(kind: &str) -> Box<dyn UnixRunner> {
    match kind {
        "sudo" => Box::new(SudoRunner::root()),
        "direct" => Box::new(SystemRunner),
        _ => Box::new(NoopRunner::new()),
    }
}

pub(crate) async fn sync_worktree_by_id(
    client: &Arc<DaemonClient>,
    worktree_id: &str,
    delete: bool,
) -> Result<(), AgorError> {
    let (runner, view): (_, unix_sync::WorktreeSyncView) =
        fetch_sync_view(client, "worktrees", worktree_id, json!({"delete": delete})).await?;
    unix_sync::sync_worktree(runner.as_ref(), &view, delete).await
}

pub async fn sync_worktree(
    client: Arc<DaemonClient>,
    params: SyncWorktreeParams,
) -> Result<Option<Value>, AgorError> {
    sync_worktree_by_id(&client, params.worktree_id.as_str(), params.delete).await?;
    info!(worktree = %params.worktree_id, delete = params.delete, "worktree sync done");
    Ok(None)
}

pub async fn sync_repo(
    client: Arc<DaemonClient>,
    params: SyncRepoParams,
) -> Result<Option<Value>, AgorError> {
    let (runner, view): (_, unix_sync::RepoSyncView) = fetch_sync_view(
        &client,
        "repos",
        params.repo_id.as_str(),
        json!({"delete": params.delete}),
    )
    .await?;
    unix_sync::sync_repo(runner.as_ref(), &view, params.delete).await?;
    Ok(None)
}

pub async fn sync_user(
    client: Arc<DaemonClient>,
    params: SyncUserParams,
) -> Result<Option<Value>, AgorError> {
    let (runner, view): (_, unix_sync::UserSyncView) = fetch_sync_view(
        &client,
        "users",
        params.user_id.as_str(),
        json!({"delete": params.delete}),
    )
    .await?;
    unix_sync::sync_user(
        runner.as_ref(),
        &view,
        params.password.as_deref(),
        params.delete,
        params.delete_home,
    )
    .await?;
    Ok(None)
}
