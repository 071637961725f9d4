// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY bridge for the terminal service.
//!
//! `zellij` mode attaches to (or creates) a persistent multiplexer
//! session; `shell` mode spawns a bare `$SHELL` with no persistence.
//! Output is pumped off a blocking reader thread into a tokio channel.

use agor_core::{AgorError, ErrorKind};
use parking_lot::Mutex;
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::debug;

/// How the PTY is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    Zellij,
    Shell,
}

/// Spawn parameters for one PTY.
#[derive(Debug, Clone)]
pub struct TerminalSpawn {
    pub kind: TerminalKind,
    /// Multiplexer session name (zellij mode).
    pub session_name: String,
    pub cwd: PathBuf,
    pub cols: u16,
    pub rows: u16,
    /// Initial tab to create/focus (zellij mode).
    pub tab_name: Option<String>,
    /// File sourced into the shell environment before exec.
    pub env_file: Option<PathBuf>,
}

/// A live PTY: write input, resize, kill; output arrives on the receiver.
pub struct Terminal {
    writer: Mutex<Box<dyn Write + Send>>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
}

fn pty_err(what: &str, e: impl std::fmt::Display) -> AgorError {
    AgorError::new(ErrorKind::FilesystemError, format!("{what}: {e}"))
}

impl Terminal {
    /// Spawn the PTY and return it with the output stream.
    pub fn spawn(params: &TerminalSpawn) -> Result<(Terminal, mpsc::Receiver<Vec<u8>>), AgorError> {
        let pty = native_pty_system()
            .openpty(PtySize {
                rows: params.rows,
                cols: params.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| pty_err("openpty", e))?;

        let mut cmd = build_command(params);
        cmd.cwd(&params.cwd);
        let child = pty.slave.spawn_command(cmd).map_err(|e| pty_err("pty spawn", e))?;
        let killer = child.clone_killer();

        let writer = pty.master.take_writer().map_err(|e| pty_err("pty writer", e))?;
        let mut reader = pty.master.try_clone_reader().map_err(|e| pty_err("pty reader", e))?;

        // Blocking pump: PTY reads have no async story; a thread per
        // terminal is the portable answer.
        let (tx, rx) = mpsc::channel::<Vec<u8>>(256);
        std::thread::spawn(move || {
            let mut buf = [0u8; 8192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("pty reader pump finished");
        });

        Ok((
            Terminal {
                writer: Mutex::new(writer),
                master: Mutex::new(pty.master),
                killer: Mutex::new(killer),
            },
            rx,
        ))
    }

    pub fn write_input(&self, data: &[u8]) -> Result<(), AgorError> {
        let mut writer = self.writer.lock();
        writer.write_all(data).map_err(|e| pty_err("pty write", e))?;
        writer.flush().map_err(|e| pty_err("pty flush", e))
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), AgorError> {
        self.master
            .lock()
            .resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| pty_err("pty resize", e))
    }

    pub fn kill(&self) {
        let _ = self.killer.lock().kill();
    }
}

fn build_command(params: &TerminalSpawn) -> CommandBuilder {
    match params.kind {
        TerminalKind::Zellij => {
            let mut cmd = CommandBuilder::new("zellij");
            cmd.arg("attach");
            cmd.arg("--create");
            cmd.arg(&params.session_name);
            if let Some(env_file) = &params.env_file {
                cmd.env("AGOR_ENV_FILE", env_file);
            }
            cmd
        }
        TerminalKind::Shell => {
            let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
            let mut cmd = CommandBuilder::new(&shell);
            if let Some(env_file) = &params.env_file {
                // Source the env file, then hand over to an interactive shell.
                cmd.arg("-c");
                cmd.arg(format!(". {} && exec {shell} -i", env_file.display()));
            }
            cmd
        }
    }
}

/// Create or focus a named tab in an existing zellij session.
pub async fn zellij_tab(
    session_name: &str,
    tab_name: &str,
    cwd: Option<&Path>,
) -> Result<(), AgorError> {
    let mut cmd = tokio::process::Command::new("zellij");
    cmd.arg("--session").arg(session_name);
    cmd.arg("action").arg("go-to-tab-name").arg("--create").arg(tab_name);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    let output = crate::subprocess::run_with_timeout(
        cmd,
        crate::subprocess::INSPECT_TIMEOUT,
        "zellij action",
    )
    .await
    .map_err(|e| pty_err("zellij action", e))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(AgorError::new(
            ErrorKind::UnixOpFailed,
            format!("zellij tab failed: {}", crate::subprocess::stderr_summary(&output)),
        ))
    }
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
