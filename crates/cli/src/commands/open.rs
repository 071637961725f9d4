// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agor open` — print (and try to open) a worktree's app URL.

use crate::client;
use crate::output::OutputFormat;
use anyhow::{anyhow, Result};
use clap::Args;
use serde_json::json;

#[derive(Args)]
pub struct OpenArgs {
    /// Worktree id (or short id)
    pub id: String,
    /// Print the URL without launching a browser
    #[arg(long)]
    pub print_only: bool,
}

pub async fn run(args: OpenArgs, _format: OutputFormat) -> Result<()> {
    let client = client::connect_authenticated().await?;
    let info = client.call("worktrees", "info", Some(&args.id), json!({})).await?;
    let app_port = info
        .get("app_port")
        .and_then(|p| p.as_u64())
        .ok_or_else(|| anyhow!("worktree has no app port"))? as u16;

    // Codespaces forward ports on a public domain; locally it's loopback.
    let url = match agor_daemon::env::codespace_host(app_port) {
        Some(host) => format!("https://{host}"),
        None => format!("http://127.0.0.1:{app_port}"),
    };
    println!("{url}");

    if !args.print_only {
        let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
        let _ = std::process::Command::new(opener)
            .arg(&url)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();
    }
    Ok(())
}
