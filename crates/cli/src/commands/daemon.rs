// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agor daemon` — daemon management commands.

use crate::client;
use crate::exit_error::ExitError;
use crate::output::{print_record, OutputFormat};
use agor_wire::{Request, Response};
use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use notify::{RecursiveMode, Watcher};
use std::io::{BufRead, BufReader, Seek, SeekFrom};

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon (background unless --foreground)
    Start {
        /// Run in foreground (useful for debugging)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the daemon
    Stop,
    /// Stop and restart the daemon
    Restart,
    /// Daemon status
    Status,
    /// View daemon logs
    Logs {
        /// Number of recent lines to show
        #[arg(short = 'n', long, default_value = "200")]
        lines: usize,
        /// Follow log output
        #[arg(long, short)]
        follow: bool,
    },
}

pub async fn run(args: DaemonArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        DaemonCommand::Start { foreground } => start(foreground).await,
        DaemonCommand::Stop => stop().await,
        DaemonCommand::Restart => {
            // Best-effort stop, then a fresh start.
            let _ = stop().await;
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            start(false).await
        }
        DaemonCommand::Status => status(format).await,
        DaemonCommand::Logs { lines, follow } => logs(lines, follow),
    }
}

fn daemon_binary() -> std::path::PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("agord")))
        .filter(|p| p.exists())
        .unwrap_or_else(|| "agord".into())
}

async fn start(foreground: bool) -> Result<()> {
    if is_running().await {
        println!("daemon already running");
        return Ok(());
    }
    let binary = daemon_binary();
    if foreground {
        let status = std::process::Command::new(&binary).status()?;
        if !status.success() {
            return Err(ExitError::operational(format!(
                "daemon exited with {}",
                status.code().unwrap_or(-1)
            )));
        }
        return Ok(());
    }

    let mut child = std::process::Command::new(&binary)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| anyhow!("cannot start {}: {e}", binary.display()))?;

    // Wait for the READY line before declaring success.
    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let _ = reader.read_line(&mut line);
        if line.trim() == "READY" {
            println!("daemon started (pid {})", child.id());
            return Ok(());
        }
    }
    Err(ExitError::operational("daemon did not report READY; check `agor daemon logs`"))
}

async fn stop() -> Result<()> {
    match client::request(Request::Shutdown).await {
        Ok(Response::ShuttingDown) => {
            println!("daemon stopping");
            Ok(())
        }
        Ok(Response::Error { error }) => Err(anyhow!("{}", error.message)),
        Ok(other) => Err(anyhow!("unexpected response {other:?}")),
        Err(_) => {
            println!("daemon not running");
            Ok(())
        }
    }
}

async fn is_running() -> bool {
    // Presence of the pid file + a live process counts as "running";
    // the socket probe is the authority.
    client::request(Request::Ping).await.is_ok()
}

async fn status(format: OutputFormat) -> Result<()> {
    match client::request(Request::Status).await {
        Ok(Response::Status { status }) => {
            print_record(format, &serde_json::to_value(status)?);
            Ok(())
        }
        Ok(other) => Err(anyhow!("unexpected response {other:?}")),
        Err(_) => Err(ExitError::operational("daemon not running")),
    }
}

fn logs(lines: usize, follow: bool) -> Result<()> {
    let path = client::data_home().join("logs").join("daemon.log");
    if !path.exists() {
        return Err(ExitError::operational(format!("no log file at {}", path.display())));
    }

    let file = std::fs::File::open(&path)?;
    let all: Vec<String> = BufReader::new(&file).lines().map_while(|l| l.ok()).collect();
    let start = all.len().saturating_sub(lines);
    for line in &all[start..] {
        println!("{line}");
    }
    if !follow {
        return Ok(());
    }

    // Follow mode: re-read from the previous offset on every change.
    let mut offset = std::fs::metadata(&path)?.len();
    let (tx, rx) = std::sync::mpsc::channel::<()>();
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        if event.is_ok() {
            let _ = tx.send(());
        }
    })?;
    watcher.watch(&path, RecursiveMode::NonRecursive)?;

    loop {
        let _ = rx.recv();
        let mut file = std::fs::File::open(&path)?;
        let len = file.metadata()?.len();
        if len < offset {
            offset = 0;
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        while reader.read_line(&mut line)? > 0 {
            print!("{line}");
            offset += line.len() as u64;
            line.clear();
        }
    }
}
