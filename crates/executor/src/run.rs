// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payload intake and action dispatch.

use agor_core::{AgorError, ErrorKind};
use agor_wire::{DaemonClient, ExecutorAction, ExecutorPayload, ExecutorResult};
use serde_json::Value;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tracing::info;

const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn run() -> i32 {
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut line = String::new();
    if let Err(e) = stdin.read_line(&mut line).await {
        return emit(ExecutorResult::err(AgorError::new(
            ErrorKind::ValidationFailed,
            format!("payload read failed: {e}"),
        )));
    }

    let payload = match ExecutorPayload::parse(line.as_bytes()) {
        Ok(payload) => payload,
        Err(e) => return emit(ExecutorResult::err(e)),
    };
    info!(command = payload.command(), "executor starting");

    if let Some(env) = &payload.env {
        for (key, value) in env {
            std::env::set_var(key, value);
        }
    }

    let socket = socket_path(&payload);
    let connect =
        DaemonClient::connect(&socket, PROTOCOL_VERSION, Some(&payload.session_token)).await;
    let (client, events) = match connect {
        Ok(pair) => pair,
        Err(e) => {
            return emit(ExecutorResult::err(AgorError::new(
                ErrorKind::NetworkError,
                format!("daemon dial-back failed on {}: {e}", socket.display()),
            )))
        }
    };

    let result = dispatch(payload, client, events, stdin).await;
    let code = if result.success { 0 } else { 1 };
    emit(result);
    code
}

async fn dispatch(
    payload: ExecutorPayload,
    client: std::sync::Arc<DaemonClient>,
    events: tokio::sync::mpsc::UnboundedReceiver<(Vec<String>, agor_core::Event)>,
    stdin: BufReader<Stdin>,
) -> ExecutorResult {
    let outcome: Result<Option<Value>, AgorError> = match payload.action {
        ExecutorAction::Prompt(params) => crate::prompt::run(client, stdin, params).await,
        ExecutorAction::GitClone(params) => crate::gitops::clone(client, params).await,
        ExecutorAction::WorktreeAdd(params) => crate::gitops::worktree_add(client, params).await,
        ExecutorAction::WorktreeRemove(params) => {
            crate::gitops::worktree_remove(client, params).await
        }
        ExecutorAction::WorktreeClean(params) => crate::gitops::worktree_clean(params).await,
        ExecutorAction::SyncWorktree(params) => {
            crate::unixops::sync_worktree(client, params).await
        }
        ExecutorAction::SyncRepo(params) => crate::unixops::sync_repo(client, params).await,
        ExecutorAction::SyncUser(params) => crate::unixops::sync_user(client, params).await,
        ExecutorAction::ZellijAttach(params) => {
            crate::zellij::attach(client, events, params).await
        }
        ExecutorAction::ZellijTab(params) => crate::zellij::tab(params).await,
    };

    match outcome {
        Ok(data) => ExecutorResult::ok(data),
        Err(e) => ExecutorResult::err(e),
    }
}

fn socket_path(payload: &ExecutorPayload) -> PathBuf {
    if let Some(url) = &payload.daemon_url {
        if let Some(path) = url.strip_prefix("unix:") {
            return PathBuf::from(path);
        }
    }
    if let Some(data_home) = &payload.data_home {
        return data_home.join("daemon.sock");
    }
    dirs_fallback().join("daemon.sock")
}

fn dirs_fallback() -> PathBuf {
    std::env::var("AGOR_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::var("HOME")
                .map(|home| PathBuf::from(home).join(".agor"))
                .unwrap_or_else(|_| PathBuf::from("/var/lib/agor"))
        })
}

fn emit(result: ExecutorResult) -> i32 {
    match serde_json::to_string(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => println!(
            "{{\"success\":false,\"error\":{{\"code\":\"validation-failed\",\"message\":\"result serialization failed: {e}\"}}}}"
        ),
    }
    i32::from(!result.success)
}
