// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor process spawning and lifecycle handles.
//!
//! Impersonation happens here and only here: the daemon picks the Unix
//! account and wraps the spawn in `sudo -n -u <user>`; the payload
//! itself carries no identity the executor could be lied to about.
//! Git-affecting commands still run as the daemon user but wrapped in
//! sudo to itself, forcing `initgroups()` so freshly created worktree
//! groups are visible without a daemon restart.

use agor_core::{AgorError, ErrorKind};
use agor_wire::{ExecutorPayload, ExecutorResult};
use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Cap on captured executor stderr.
pub const STDERR_CAP: usize = 4096;

/// Line the executor's stdin watcher interprets as a cooperative stop.
pub const STOP_LINE: &str = "{\"stop\":true}";

/// One executor spawn.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub payload: ExecutorPayload,
    /// Unix account to impersonate; `None` runs as the daemon.
    pub run_as: Option<String>,
    /// Wrap in `sudo -u <daemon-user>` even without impersonation
    /// (fresh group membership for git operations).
    pub sudo_self_as: Option<String>,
}

/// Terminal state of an executor process.
#[derive(Debug, Clone)]
pub struct ExecutorExit {
    pub code: i32,
    /// Captured stderr, truncated to [`STDERR_CAP`].
    pub stderr: String,
    /// The final `ExecutorResult` line, when one was written.
    pub result: Option<ExecutorResult>,
}

impl ExecutorExit {
    pub fn success(&self) -> bool {
        self.code == 0 && self.result.as_ref().is_none_or(|r| r.success)
    }
}

/// Live handle: cooperative stop, signal escalation, exit observation.
#[derive(Debug)]
pub struct ExecutorHandle {
    pid: Option<u32>,
    stop_tx: Mutex<Option<mpsc::Sender<()>>>,
    exit_rx: tokio::sync::Mutex<Option<oneshot::Receiver<ExecutorExit>>>,
    exited: Mutex<Option<ExecutorExit>>,
}

impl ExecutorHandle {
    pub fn new(
        pid: Option<u32>,
        stop_tx: mpsc::Sender<()>,
        exit_rx: oneshot::Receiver<ExecutorExit>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pid,
            stop_tx: Mutex::new(Some(stop_tx)),
            exit_rx: tokio::sync::Mutex::new(Some(exit_rx)),
            exited: Mutex::new(None),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Request a cooperative stop. Idempotent; false when the process
    /// is already past the point of listening.
    pub async fn send_stop(&self) -> bool {
        let tx = self.stop_tx.lock().clone();
        match tx {
            Some(tx) => tx.send(()).await.is_ok(),
            None => false,
        }
    }

    pub fn signal_term(&self) {
        self.signal(Signal::SIGTERM);
    }

    pub fn signal_kill(&self) {
        self.signal(Signal::SIGKILL);
    }

    fn signal(&self, signal: Signal) {
        if let Some(pid) = self.pid {
            if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
                debug!(pid, %signal, error = %e, "signal delivery failed");
            }
        }
    }

    /// Exit state if the process has already been observed finishing.
    pub fn try_exited(&self) -> Option<ExecutorExit> {
        self.exited.lock().clone()
    }

    /// Wait for process exit (first caller drives; later calls get the
    /// cached exit).
    pub async fn wait(&self) -> ExecutorExit {
        if let Some(exit) = self.try_exited() {
            return exit;
        }
        let mut slot = self.exit_rx.lock().await;
        if let Some(exit) = self.try_exited() {
            return exit;
        }
        let exit = match slot.take() {
            Some(rx) => rx.await.unwrap_or(ExecutorExit {
                code: -1,
                stderr: "executor watcher dropped".into(),
                result: None,
            }),
            None => ExecutorExit { code: -1, stderr: "executor already reaped".into(), result: None },
        };
        *self.exited.lock() = Some(exit.clone());
        *self.stop_tx.lock() = None;
        exit
    }
}

/// Spawns executors. The daemon uses [`ProcessSpawner`]; tests script.
#[async_trait]
pub trait ExecutorSpawner: Send + Sync {
    async fn spawn(&self, request: SpawnRequest) -> Result<Arc<ExecutorHandle>, AgorError>;
}

/// Spawns the real `agor-executor` binary.
pub struct ProcessSpawner {
    pub executor_bin: PathBuf,
}

impl ProcessSpawner {
    pub fn new(executor_bin: PathBuf) -> Self {
        Self { executor_bin }
    }

    fn command(&self, request: &SpawnRequest) -> Command {
        let sudo_target = request.run_as.as_deref().or(request.sudo_self_as.as_deref());
        match sudo_target {
            Some(user) => {
                let mut cmd = Command::new("sudo");
                cmd.arg("-n").arg("-u").arg(user).arg(&self.executor_bin);
                cmd
            }
            None => Command::new(&self.executor_bin),
        }
    }
}

#[async_trait]
impl ExecutorSpawner for ProcessSpawner {
    async fn spawn(&self, request: SpawnRequest) -> Result<Arc<ExecutorHandle>, AgorError> {
        let payload_json = serde_json::to_vec(&request.payload).map_err(|e| {
            AgorError::new(ErrorKind::ValidationFailed, format!("payload serialization: {e}"))
        })?;

        let mut cmd = self.command(&request);
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            AgorError::new(
                ErrorKind::ExecutorSpawnFailed,
                format!("spawning {} failed: {e}", self.executor_bin.display()),
            )
        })?;
        let pid = child.id();

        let mut stdin = child.stdin.take().ok_or_else(|| {
            AgorError::new(ErrorKind::ExecutorSpawnFailed, "executor stdin unavailable")
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            AgorError::new(ErrorKind::ExecutorSpawnFailed, "executor stdout unavailable")
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            AgorError::new(ErrorKind::ExecutorSpawnFailed, "executor stderr unavailable")
        })?;

        stdin.write_all(&payload_json).await.map_err(|e| {
            AgorError::new(ErrorKind::ExecutorSpawnFailed, format!("payload write: {e}"))
        })?;
        stdin.write_all(b"\n").await.map_err(|e| {
            AgorError::new(ErrorKind::ExecutorSpawnFailed, format!("payload write: {e}"))
        })?;

        // Keep stdin open: the stop forwarder owns it from here.
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            while stop_rx.recv().await.is_some() {
                if stdin.write_all(format!("{STOP_LINE}\n").as_bytes()).await.is_err() {
                    break;
                }
                let _ = stdin.flush().await;
            }
        });

        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(async move {
            // Last parseable stdout line is the ExecutorResult.
            let mut result = None;
            let mut lines = BufReader::new(stdout).lines();
            let stderr_task = tokio::spawn(async move {
                let mut buf = String::new();
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if buf.len() < STDERR_CAP {
                        buf.push_str(&line);
                        buf.push('\n');
                    }
                }
                buf.truncate(STDERR_CAP);
                buf
            });
            while let Ok(Some(line)) = lines.next_line().await {
                if let Ok(parsed) = serde_json::from_str::<ExecutorResult>(&line) {
                    result = Some(parsed);
                }
            }
            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    warn!(error = %e, "executor wait failed");
                    -1
                }
            };
            let stderr = stderr_task.await.unwrap_or_default();
            let _ = exit_tx.send(ExecutorExit { code, stderr, result });
        });

        Ok(ExecutorHandle::new(pid, stop_tx, exit_rx))
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
