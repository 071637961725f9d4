// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

/// Protocol version announced in the Hello handshake.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve the data home: `AGOR_DATA_HOME` > `~/.agor`.
pub fn data_home() -> PathBuf {
    if let Ok(dir) = std::env::var("AGOR_DATA_HOME") {
        return PathBuf::from(dir);
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/var/lib")).join(".agor")
}

/// Database directory override (`AGOR_DB_PATH`), else `<data>/db`.
pub fn db_path(data_home: &std::path::Path) -> PathBuf {
    std::env::var("AGOR_DB_PATH").map(PathBuf::from).unwrap_or_else(|_| data_home.join("db"))
}

/// Requested database dialect. The embedded store is the only engine in
/// this tree; anything else is logged and ignored.
pub fn db_dialect() -> Option<String> {
    std::env::var("AGOR_DB_DIALECT").ok().or_else(|| {
        std::env::var("DATABASE_URL")
            .ok()
            .and_then(|url| url.split(':').next().map(str::to_string))
    })
}

/// Log filter (`AGOR_LOG`), default `info`.
pub fn log_filter() -> String {
    std::env::var("AGOR_LOG").unwrap_or_else(|_| "info".to_string())
}

/// Codespace host rewriting for `worktree ssh` / `open` URLs.
pub fn codespace_host(port: u16) -> Option<String> {
    let name = std::env::var("CODESPACE_NAME").ok()?;
    let domain = std::env::var("GITHUB_CODESPACES_PORT_FORWARDING_DOMAIN").ok()?;
    Some(format!("{name}-{port}.{domain}"))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
