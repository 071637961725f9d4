// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration: impersonation policy, binaries, timings.

use agor_core::PortBases;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which Unix user executors run as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ImpersonationMode {
    /// No impersonation: executors run as the daemon user.
    #[default]
    Simple,
    /// One fixed executor account for every run.
    Insulated { user: String },
    /// Each run impersonates the requesting user's `unix_username`.
    Strict,
}

impl ImpersonationMode {
    /// Resolve the Unix account for an executor run. `None` means "run
    /// as the daemon itself, unwrapped".
    ///
    /// Strict mode without a provisioned `unix_username` is a hard
    /// error upstream; here it degrades to the daemon user so internal
    /// dispatches (sweeps, gateway) still run.
    pub fn resolve<'a>(&'a self, requesting_unix_username: Option<&'a str>) -> Option<&'a str> {
        match self {
            ImpersonationMode::Simple => None,
            ImpersonationMode::Insulated { user } => Some(user),
            ImpersonationMode::Strict => requesting_unix_username,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub impersonation: ImpersonationMode,
    /// Account the daemon itself runs as (joins worktree groups).
    pub daemon_user: Option<String>,
    /// Path to the `agor-executor` binary.
    pub executor_bin: PathBuf,
    /// URL executors dial back to.
    pub daemon_url: String,
    pub data_home: PathBuf,
    pub port_bases: PortBases,
    /// Grace between cooperative stop and SIGTERM.
    pub stop_grace: Duration,
    /// Grace between SIGTERM and SIGKILL.
    pub kill_grace: Duration,
    /// Age after which a `creating` worktree is swept to `failed`.
    pub creating_max_age: Duration,
    /// Whether Unix RBAC (groups/ACLs) is enabled.
    pub unix_rbac: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            impersonation: ImpersonationMode::Simple,
            daemon_user: None,
            executor_bin: PathBuf::from("agor-executor"),
            daemon_url: "unix:".into(),
            data_home: PathBuf::from("/var/lib/agor"),
            port_bases: PortBases::default(),
            stop_grace: Duration::from_secs(2),
            kill_grace: Duration::from_secs(5),
            creating_max_age: Duration::from_secs(15 * 60),
            unix_rbac: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
