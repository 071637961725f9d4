// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

mod startup;
pub use startup::{build_registry, shutdown, startup, StartupResult};

use std::path::PathBuf;
use thiserror::Error;

/// Fixed layout under the data home.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub data_home: PathBuf,
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
    pub log_path: PathBuf,
    pub config_path: PathBuf,
    pub secret_path: PathBuf,
    pub repos_path: PathBuf,
    pub worktrees_path: PathBuf,
}

impl DaemonPaths {
    pub fn new(data_home: PathBuf) -> Self {
        Self {
            socket_path: data_home.join("daemon.sock"),
            pid_path: data_home.join("daemon.pid"),
            log_path: data_home.join("logs").join("daemon.log"),
            config_path: data_home.join("config.yaml"),
            secret_path: data_home.join("daemon.secret"),
            repos_path: data_home.join("repos"),
            worktrees_path: data_home.join("worktrees"),
            data_home,
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("another daemon already holds {0} (is agord running?)")]
    AlreadyRunning(PathBuf),

    #[error("I/O error during startup: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] agor_storage::StoreError),

    #[error("{0}")]
    Config(agor_core::AgorError),

    #[error("database schema is ahead of this daemon: {0}; run `agor db migrate` after upgrading")]
    MigrationPending(String),
}
