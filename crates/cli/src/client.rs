// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI-side daemon connection and the cli-token file.

use agor_wire::{DaemonClient, Request, Response};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `<data>/cli-token`, mode 0600.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliToken {
    pub access_token: String,
    pub user: serde_json::Value,
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_url: Option<String>,
}

pub fn data_home() -> PathBuf {
    agor_daemon::env::data_home()
}

pub fn socket_path() -> PathBuf {
    if let Ok(url) = std::env::var("AGOR_DAEMON_URL") {
        if let Some(path) = url.strip_prefix("unix:") {
            return PathBuf::from(path);
        }
    }
    data_home().join("daemon.sock")
}

pub fn token_path() -> PathBuf {
    data_home().join("cli-token")
}

pub fn load_token() -> Option<CliToken> {
    let text = std::fs::read_to_string(token_path()).ok()?;
    let token: CliToken = serde_json::from_str(&text).ok()?;
    if token.expires_at <= chrono::Utc::now().timestamp() {
        return None;
    }
    Some(token)
}

pub fn save_token(token: &CliToken) -> Result<()> {
    let path = token_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_vec_pretty(token)?)?;
    let mut permissions = std::fs::metadata(&path)?.permissions();
    permissions.set_mode(0o600);
    std::fs::set_permissions(&path, permissions)?;
    Ok(())
}

/// Connect with the stored token (if any).
pub async fn connect() -> Result<Arc<DaemonClient>> {
    let token = load_token();
    let socket = socket_path();
    let (client, _events) = DaemonClient::connect(
        &socket,
        CLI_VERSION,
        token.as_ref().map(|t| t.access_token.as_str()),
    )
    .await
    .with_context(|| {
        format!("cannot reach the daemon at {} (is agord running?)", socket.display())
    })?;
    Ok(client)
}

/// Connect and fail if there is no valid stored token.
pub async fn connect_authenticated() -> Result<Arc<DaemonClient>> {
    if load_token().is_none() {
        return Err(anyhow!("not logged in; run `agor login` first"));
    }
    connect().await
}

/// One-off request helper.
pub async fn request(request: Request) -> Result<Response> {
    let client = connect().await?;
    Ok(client.request(request).await?)
}
