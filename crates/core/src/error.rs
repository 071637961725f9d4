// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the daemon, engine, and wire layers.
//!
//! User-visible failures carry a stable `code`, an actionable `message`,
//! and optional structured `details` — never a stack trace.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error kinds surfaced on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NotAuthenticated,
    Forbidden,
    NotFound,
    AmbiguousIdPrefix,
    ValidationFailed,
    SessionBusy,
    ExecutorSpawnFailed,
    ExecutorCrashed,
    ToolFailureTransient,
    ToolFailurePermanent,
    PermissionDenied,
    Timeout,
    Conflict,
    UnixOpFailed,
    FilesystemError,
    GitError,
    NetworkError,
    MigrationPending,
}

crate::simple_display! {
    ErrorKind {
        NotAuthenticated => "not-authenticated",
        Forbidden => "forbidden",
        NotFound => "not-found",
        AmbiguousIdPrefix => "ambiguous-id-prefix",
        ValidationFailed => "validation-failed",
        SessionBusy => "session-busy",
        ExecutorSpawnFailed => "executor-spawn-failed",
        ExecutorCrashed => "executor-crashed",
        ToolFailureTransient => "tool-failure-transient",
        ToolFailurePermanent => "tool-failure-permanent",
        PermissionDenied => "permission-denied",
        Timeout => "timeout",
        Conflict => "conflict",
        UnixOpFailed => "unix-op-failed",
        FilesystemError => "filesystem-error",
        GitError => "git-error",
        NetworkError => "network-error",
        MigrationPending => "migration-pending",
    }
}

impl ErrorKind {
    /// Stable wire code for this kind.
    pub fn code(&self) -> String {
        self.to_string()
    }
}

/// An error as it travels through services and onto the wire.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct AgorError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AgorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound, format!("{what} not found"))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailed, message)
    }

    pub fn session_busy(session_id: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorKind::SessionBusy,
            format!("session {session_id} already has an active task"),
        )
    }

    /// Ambiguous prefix error listing up to three matches plus ellipsis.
    pub fn ambiguous_prefix(prefix: &str, matches: &[String]) -> Self {
        let mut listed: Vec<&str> = matches.iter().take(3).map(String::as_str).collect();
        let suffix = if matches.len() > 3 {
            listed.push("…");
            listed.join(", ")
        } else {
            listed.join(", ")
        };
        Self::new(
            ErrorKind::AmbiguousIdPrefix,
            format!("id prefix {prefix:?} is ambiguous: {suffix}"),
        )
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
