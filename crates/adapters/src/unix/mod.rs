// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Privileged command runner for Unix group/user/ACL operations.
//!
//! Three implementations: [`SystemRunner`] executes directly (daemon
//! already privileged), [`SudoRunner`] wraps each command in
//! non-interactive sudo, and [`NoopRunner`] logs intent when Unix RBAC
//! is disabled. Sudo never gets a TTY and never prompts: `-n` plus a
//! closed stdin, so a misconfigured sudoers fails fast instead of
//! hanging the daemon.

pub mod ops;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeUnixHost;

use crate::subprocess::{run_with_stdin, run_with_timeout, INSPECT_TIMEOUT, MUTATE_TIMEOUT};
use agor_core::{AgorError, ErrorKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::Command;
use tracing::{debug, info};

/// Output of one host command.
#[derive(Debug, Clone, Default)]
pub struct UnixCommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl UnixCommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn from_output(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Executes host commands for group/user/ACL management.
#[async_trait]
pub trait UnixRunner: Send + Sync {
    /// Mutating command (30 s timeout).
    async fn run(&self, program: &str, args: &[&str]) -> Result<UnixCommandOutput, AgorError>;

    /// Read-only inspection (5 s timeout).
    async fn inspect(&self, program: &str, args: &[&str]) -> Result<UnixCommandOutput, AgorError>;

    /// Mutating command fed `input` on stdin (chpasswd-style secrets).
    async fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<UnixCommandOutput, AgorError>;

    /// False for the noop runner — sync code skips verification then.
    fn is_enabled(&self) -> bool {
        true
    }
}

fn io_err(program: &str, e: std::io::Error) -> AgorError {
    let kind = if e.kind() == std::io::ErrorKind::TimedOut {
        ErrorKind::Timeout
    } else {
        ErrorKind::UnixOpFailed
    };
    AgorError::new(kind, format!("{program}: {e}"))
}

/// Runs commands directly as the daemon user.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

#[async_trait]
impl UnixRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<UnixCommandOutput, AgorError> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        let output =
            run_with_timeout(cmd, MUTATE_TIMEOUT, program).await.map_err(|e| io_err(program, e))?;
        Ok(UnixCommandOutput::from_output(output))
    }

    async fn inspect(&self, program: &str, args: &[&str]) -> Result<UnixCommandOutput, AgorError> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        let output = run_with_timeout(cmd, INSPECT_TIMEOUT, program)
            .await
            .map_err(|e| io_err(program, e))?;
        Ok(UnixCommandOutput::from_output(output))
    }

    async fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<UnixCommandOutput, AgorError> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        let output = run_with_stdin(cmd, input, MUTATE_TIMEOUT, program)
            .await
            .map_err(|e| io_err(program, e))?;
        Ok(UnixCommandOutput::from_output(output))
    }
}

/// Wraps every command in `sudo -n` (optionally `-u <user>`).
#[derive(Debug, Clone)]
pub struct SudoRunner {
    /// Target user; None means root.
    pub as_user: Option<String>,
}

impl SudoRunner {
    pub fn root() -> Self {
        Self { as_user: None }
    }

    pub fn as_user(user: impl Into<String>) -> Self {
        Self { as_user: Some(user.into()) }
    }

    fn command(&self, program: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new("sudo");
        // Non-interactive, no TTY: a password prompt must fail, not hang.
        cmd.arg("-n");
        if let Some(user) = &self.as_user {
            cmd.arg("-u").arg(user);
        }
        cmd.arg(program);
        cmd.args(args);
        cmd
    }
}

#[async_trait]
impl UnixRunner for SudoRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<UnixCommandOutput, AgorError> {
        let output = run_with_timeout(self.command(program, args), MUTATE_TIMEOUT, program)
            .await
            .map_err(|e| io_err(program, e))?;
        Ok(UnixCommandOutput::from_output(output))
    }

    async fn inspect(&self, program: &str, args: &[&str]) -> Result<UnixCommandOutput, AgorError> {
        let output = run_with_timeout(self.command(program, args), INSPECT_TIMEOUT, program)
            .await
            .map_err(|e| io_err(program, e))?;
        Ok(UnixCommandOutput::from_output(output))
    }

    async fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<UnixCommandOutput, AgorError> {
        let output = run_with_stdin(self.command(program, args), input, MUTATE_TIMEOUT, program)
            .await
            .map_err(|e| io_err(program, e))?;
        Ok(UnixCommandOutput::from_output(output))
    }
}

/// Logs what would run; used when Unix RBAC is disabled.
#[derive(Debug, Default)]
pub struct NoopRunner {
    commands: Mutex<Vec<String>>,
}

impl NoopRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands that would have run (for tests and `--dry-run` output).
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    fn record(&self, program: &str, args: &[&str]) -> UnixCommandOutput {
        let line = format!("{program} {}", args.join(" "));
        info!(command = %line, "unix rbac disabled; skipping");
        self.commands.lock().push(line);
        UnixCommandOutput { exit_code: 0, stdout: String::new(), stderr: String::new() }
    }
}

#[async_trait]
impl UnixRunner for NoopRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<UnixCommandOutput, AgorError> {
        Ok(self.record(program, args))
    }

    async fn inspect(&self, program: &str, args: &[&str]) -> Result<UnixCommandOutput, AgorError> {
        debug!(program, ?args, "noop inspect");
        Ok(self.record(program, args))
    }

    async fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        _input: &[u8],
    ) -> Result<UnixCommandOutput, AgorError> {
        // Never log the input — it may be a password.
        Ok(self.record(program, args))
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
