// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution with timeouts.
//!
//! Every privileged command runs without a controlling TTY and with
//! stdin closed (or explicitly piped) — a sudo password prompt would
//! otherwise stall the calling task forever.

use std::process::Output;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Timeout for mutating host operations (groupadd, git clone, setfacl ...).
pub const MUTATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for inspections (getent, git rev-parse ...).
pub const INSPECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace period between cooperative stop and SIGTERM.
pub const STOP_GRACE: Duration = Duration::from_secs(2);

/// Grace period between SIGTERM and SIGKILL.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// Run `cmd` to completion, killing it on timeout.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    label: &str,
) -> Result<Output, std::io::Error> {
    cmd.stdin(std::process::Stdio::null());
    cmd.kill_on_drop(true);
    let child = cmd.output();
    match tokio::time::timeout(timeout, child).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("{label} timed out after {}s", timeout.as_secs()),
        )),
    }
}

/// Run `cmd`, writing `input` to its stdin first (for chpasswd-style
/// secret delivery — secrets never appear in argv).
pub async fn run_with_stdin(
    mut cmd: Command,
    input: &[u8],
    timeout: Duration,
    label: &str,
) -> Result<Output, std::io::Error> {
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);
    let mut child = cmd.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input).await?;
        stdin.shutdown().await?;
    }
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("{label} timed out after {}s", timeout.as_secs()),
        )),
    }
}

/// Trim stderr to a bounded, single-line summary for error messages.
pub fn stderr_summary(output: &Output) -> String {
    let text = String::from_utf8_lossy(&output.stderr);
    let trimmed = text.trim();
    if trimmed.len() > 512 {
        let mut end = 512;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
