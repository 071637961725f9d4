// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git state capture at task boundaries.

use agor_adapters::subprocess::{run_with_timeout, INSPECT_TIMEOUT};
use agor_core::task::GIT_SHA_UNKNOWN;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Capture `HEAD` with a `-dirty` suffix when the working tree has
/// uncommitted changes. Never fails: capture problems yield `"unknown"`.
pub async fn capture_sha(worktree_path: &Path) -> String {
    let sha = match git_stdout(worktree_path, &["rev-parse", "HEAD"]).await {
        Some(sha) if !sha.is_empty() => sha,
        _ => return GIT_SHA_UNKNOWN.to_string(),
    };
    match git_stdout(worktree_path, &["status", "--porcelain"]).await {
        Some(status) if status.is_empty() => sha,
        Some(_) => format!("{sha}-dirty"),
        // Status failed but rev-parse worked; report the bare SHA.
        None => sha,
    }
}

async fn git_stdout(cwd: &Path, args: &[&str]) -> Option<String> {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(cwd);
    match run_with_timeout(cmd, INSPECT_TIMEOUT, "git").await {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        Ok(output) => {
            debug!(?args, code = output.status.code(), "git capture failed");
            None
        }
        Err(e) => {
            debug!(?args, error = %e, "git capture failed");
            None
        }
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
