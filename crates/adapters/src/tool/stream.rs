// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared JSON-lines subprocess driver for the CLI-backed adapters.

use super::ToolFailure;
use agor_core::{SessionId, TaskId};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cooperative-stop registry: one cancellation token per running task.
#[derive(Default)]
pub(crate) struct TaskHandles {
    inner: Mutex<HashMap<String, CancellationToken>>,
}

impl TaskHandles {
    fn key(session_id: &SessionId, task_id: &TaskId) -> String {
        format!("{session_id}:{task_id}")
    }

    /// Register a fresh token for the task; replaces any stale entry.
    pub fn register(&self, session_id: &SessionId, task_id: &TaskId) -> CancellationToken {
        let token = CancellationToken::new();
        self.inner.lock().insert(Self::key(session_id, task_id), token.clone());
        token
    }

    pub fn remove(&self, session_id: &SessionId, task_id: &TaskId) {
        self.inner.lock().remove(&Self::key(session_id, task_id));
    }

    /// Cancel a running task. Returns false when nothing is registered
    /// (already finished, or never started here) — callers treat that as
    /// an idempotent no-op.
    pub fn cancel(&self, session_id: &SessionId, task_id: &TaskId) -> bool {
        match self.inner.lock().get(&Self::key(session_id, task_id)) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Result of a JSONL run.
#[derive(Debug)]
pub(crate) struct JsonlOutcome {
    pub exit_code: i32,
    pub cancelled: bool,
    pub stderr: String,
}

impl JsonlOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawn `cmd`, optionally write `stdin_body`, and feed every parsed
/// JSON line to `on_line`. Cancellation kills the child and drains
/// whatever output already arrived so streamed chunks land first.
pub(crate) async fn run_jsonl(
    mut cmd: Command,
    stdin_body: Option<Vec<u8>>,
    cancel: CancellationToken,
    mut on_line: impl FnMut(Value) + Send,
) -> Result<JsonlOutcome, ToolFailure> {
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.stdin(if stdin_body.is_some() {
        std::process::Stdio::piped()
    } else {
        std::process::Stdio::null()
    });
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ToolFailure::permanent(format!("agent CLI not found: {e}")),
        _ => ToolFailure::transient(format!("agent spawn failed: {e}")),
    })?;

    if let Some(body) = stdin_body {
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&body)
                .await
                .map_err(|e| ToolFailure::transient(format!("agent stdin write failed: {e}")))?;
            let _ = stdin.shutdown().await;
        }
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ToolFailure::transient("agent stdout unavailable"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ToolFailure::transient("agent stderr unavailable"))?;

    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if buf.len() < 4096 {
                buf.push_str(&line);
                buf.push('\n');
            }
        }
        buf
    });

    let mut lines = BufReader::new(stdout).lines();
    let mut cancelled = false;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Value>(trimmed) {
                            Ok(value) => on_line(value),
                            Err(_) => debug!(line = trimmed, "ignoring non-JSON agent output"),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        return Err(ToolFailure::transient(format!("agent stdout read failed: {e}")))
                    }
                }
            }
            _ = cancel.cancelled(), if !cancelled => {
                cancelled = true;
                let _ = child.start_kill();
                // Keep looping: drain output that was already buffered.
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| ToolFailure::transient(format!("agent wait failed: {e}")))?;
    let stderr = stderr_task.await.unwrap_or_default();

    Ok(JsonlOutcome { exit_code: status.code().unwrap_or(-1), cancelled, stderr })
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
