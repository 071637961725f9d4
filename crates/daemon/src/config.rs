// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration (`<data>/config.yaml`).

use agor_core::PortBases;
use agor_engine::ImpersonationMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub execution: ExecutionConfig,
    pub daemon: DaemonSection,
    pub rbac: RbacConfig,
    pub auth: AuthConfig,
}

// No deny_unknown_fields here: the flattened impersonation tag owns the
// leftover keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Impersonation policy for executors.
    #[serde(flatten)]
    pub impersonation: ImpersonationMode,
    /// Path to the executor binary; default resolves on PATH.
    pub executor_bin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonSection {
    pub ssh_port_base: u16,
    pub app_port_base: u16,
}

impl Default for DaemonSection {
    fn default() -> Self {
        let bases = PortBases::default();
        Self { ssh_port_base: bases.ssh_base, app_port_base: bases.app_base }
    }
}

impl DaemonSection {
    pub fn port_bases(&self) -> PortBases {
        PortBases { ssh_base: self.ssh_port_base, app_base: self.app_port_base }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RbacConfig {
    /// Unix groups/ACL isolation on the shared host.
    pub enabled: bool,
    /// Account the daemon runs as (member of every worktree group).
    pub daemon_user: Option<String>,
    /// Privileged commands go through `sudo -n` instead of direct exec.
    pub use_sudo: bool,
}

impl RbacConfig {
    /// Runner class handed to executors for unix sync actions.
    pub fn runner_kind(&self) -> &'static str {
        if !self.enabled {
            "noop"
        } else if self.use_sudo {
            "sudo"
        } else {
            "direct"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// HS256 secret; generated and persisted on first start when unset.
    pub secret: Option<String>,
    /// Accept unauthenticated connections as the anonymous principal.
    pub allow_anonymous: bool,
    /// Token lifetime in hours (login tokens).
    pub token_ttl_hours: i64,
}

impl DaemonConfig {
    /// Load `config.yaml`, falling back to defaults when absent.
    pub fn load(path: &Path) -> Result<DaemonConfig, agor_core::AgorError> {
        if !path.exists() {
            info!(path = %path.display(), "no config.yaml; using defaults");
            return Ok(DaemonConfig::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            agor_core::AgorError::new(
                agor_core::ErrorKind::FilesystemError,
                format!("reading {}: {e}", path.display()),
            )
        })?;
        serde_yaml::from_str(&text).map_err(|e| {
            agor_core::AgorError::new(
                agor_core::ErrorKind::ValidationFailed,
                format!("invalid config.yaml: {e}"),
            )
        })
    }

    pub fn token_ttl_hours(&self) -> i64 {
        if self.auth.token_ttl_hours > 0 {
            self.auth.token_ttl_hours
        } else {
            24 * 7
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
