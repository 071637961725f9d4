// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agor worktree` — shell and ssh access to worktrees.

use crate::client;
use crate::exit_error::ExitError;
use crate::output::OutputFormat;
use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde_json::json;
use std::os::unix::process::CommandExt;

#[derive(Args)]
pub struct WorktreeArgs {
    #[command(subcommand)]
    pub command: WorktreeCommand,
}

#[derive(Subcommand)]
pub enum WorktreeCommand {
    /// Open a shell in a worktree directory
    Shell { id: String },
    /// SSH into a worktree's environment
    Ssh {
        id: String,
        /// Port override
        #[arg(short = 'p', long)]
        port: Option<u16>,
        /// Host override
        #[arg(short = 'H', long)]
        host: Option<String>,
        /// Generate the agor ed25519 key pair if missing
        #[arg(long)]
        generate_key: bool,
    },
}

pub async fn run(args: WorktreeArgs, _format: OutputFormat) -> Result<()> {
    match args.command {
        WorktreeCommand::Shell { id } => shell(&id).await,
        WorktreeCommand::Ssh { id, port, host, generate_key } => {
            ssh(&id, port, host, generate_key).await
        }
    }
}

async fn shell(id: &str) -> Result<()> {
    let client = client::connect_authenticated().await?;
    let info = client.call("worktrees", "info", Some(id), json!({})).await?;
    let path = info
        .get("path")
        .and_then(|p| p.as_str())
        .ok_or_else(|| anyhow!("worktree has no path"))?;
    if info.get("filesystem_status").and_then(|s| s.as_str()) != Some("ready") {
        return Err(ExitError::operational(format!(
            "worktree is not ready ({})",
            info.get("filesystem_status").and_then(|s| s.as_str()).unwrap_or("unknown")
        )));
    }

    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
    // exec replaces the CLI process; only reachable on spawn failure.
    let error = std::process::Command::new(shell).current_dir(path).exec();
    Err(anyhow!("cannot start shell: {error}"))
}

async fn ssh(id: &str, port: Option<u16>, host: Option<String>, generate_key: bool) -> Result<()> {
    let key_path = client::data_home().join("ssh").join("agor-key");
    if generate_key {
        generate_keypair(&key_path)?;
    }

    let client = client::connect_authenticated().await?;
    let info = client.call("terminals", "ssh-info", Some(id), json!({})).await?;
    let host = host
        .or_else(|| info.get("public_host").and_then(|h| h.as_str()).map(str::to_string))
        .or_else(|| info.get("host").and_then(|h| h.as_str()).map(str::to_string))
        .unwrap_or_else(|| "127.0.0.1".into());
    let port = port
        .or_else(|| info.get("port").and_then(|p| p.as_u64()).map(|p| p as u16))
        .ok_or_else(|| anyhow!("no ssh port registered for {id}"))?;

    let mut cmd = std::process::Command::new("ssh");
    cmd.arg("-p").arg(port.to_string());
    if key_path.exists() {
        cmd.arg("-i").arg(&key_path);
    }
    cmd.arg(format!("agor@{host}"));
    let error = cmd.exec();
    Err(anyhow!("cannot start ssh: {error}"))
}

/// ed25519 keypair at `<data>/ssh/agor-key{,.pub}` (0700 dir, 0600 key).
fn generate_keypair(key_path: &std::path::Path) -> Result<()> {
    if key_path.exists() {
        println!("key already exists at {}", key_path.display());
        return Ok(());
    }
    let dir = key_path.parent().ok_or_else(|| anyhow!("bad key path"))?;
    std::fs::create_dir_all(dir)?;
    let mut permissions = std::fs::metadata(dir)?.permissions();
    use std::os::unix::fs::PermissionsExt;
    permissions.set_mode(0o700);
    std::fs::set_permissions(dir, permissions)?;

    let status = std::process::Command::new("ssh-keygen")
        .args(["-t", "ed25519", "-N", "", "-C", "agor", "-f"])
        .arg(key_path)
        .status()?;
    if !status.success() {
        return Err(ExitError::operational("ssh-keygen failed"));
    }
    let mut permissions = std::fs::metadata(key_path)?.permissions();
    permissions.set_mode(0o600);
    std::fs::set_permissions(key_path, permissions)?;
    println!("generated {}", key_path.display());
    Ok(())
}
