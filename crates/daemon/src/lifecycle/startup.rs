// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup: pid lock, store open + migration gate, service
//! wiring, sweeps, listeners.

use super::{DaemonPaths, LifecycleError};
use crate::auth::AuthService;
use crate::channels::ChannelHub;
use crate::config::DaemonConfig;
use crate::services;
use crate::state::AppState;
use agor_core::Clock;
use agor_engine::{Engine, EngineConfig, ExecutorSpawner};
use agor_storage::{SnapshotError, Store, StoreError, StorePaths};
use fs2::FileExt;
use std::fs::File;
use std::io::Write as _;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Live daemon plus the listener socket to serve.
pub struct StartupResult<C: Clock + 'static> {
    pub state: Arc<AppState<C>>,
    listener: Option<UnixListener>,
    pub shutdown: CancellationToken,
    pub paths: DaemonPaths,
    // NOTE(lifetime): held to keep the exclusive pid lock; released on drop.
    #[allow(dead_code)]
    lock_file: File,
}

impl<C: Clock + 'static> StartupResult<C> {
    /// Hand the socket to the listener task (once).
    pub fn take_listener(&mut self) -> Option<UnixListener> {
        self.listener.take()
    }
}

/// Bring the daemon up. `spawner` is injected so tests script executors.
pub async fn startup<C: Clock + 'static>(
    paths: DaemonPaths,
    clock: C,
    spawner: Arc<dyn ExecutorSpawner>,
) -> Result<StartupResult<C>, LifecycleError> {
    std::fs::create_dir_all(&paths.data_home)?;
    std::fs::create_dir_all(paths.log_path.parent().unwrap_or(&paths.data_home))?;
    std::fs::create_dir_all(&paths.repos_path)?;
    std::fs::create_dir_all(&paths.worktrees_path)?;

    // Single decimal PID; presence + signal-0 means "running". The fs2
    // lock is what actually enforces exclusivity.
    let lock_file =
        std::fs::OpenOptions::new().create(true).write(true).open(&paths.pid_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::AlreadyRunning(paths.pid_path.clone()))?;
    lock_file.set_len(0)?;
    let mut pid_writer = &lock_file;
    writeln!(pid_writer, "{}", std::process::id())?;

    let config = DaemonConfig::load(&paths.config_path).map_err(LifecycleError::Config)?;
    if let Some(dialect) = crate::env::db_dialect() {
        info!(dialect, "db dialect requested; the embedded store serves the relational contract");
    }

    let db = crate::env::db_path(&paths.data_home);
    let store = match Store::open(
        StorePaths { wal_path: db.join("events.wal"), snapshot_path: db.join("snapshot.json.zst") },
        clock,
    ) {
        Ok(store) => store,
        Err(StoreError::Snapshot(e @ SnapshotError::MigrationPending { .. })) => {
            return Err(LifecycleError::MigrationPending(e.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let secret = load_or_create_secret(&paths)?;
    let auth = Arc::new(AuthService::new(secret, config.token_ttl_hours()));
    let hub = Arc::new(ChannelHub::new());

    let engine_config = EngineConfig {
        impersonation: config.execution.impersonation.clone(),
        daemon_user: config.rbac.daemon_user.clone(),
        executor_bin: executor_bin_path(&config),
        daemon_url: format!("unix:{}", paths.socket_path.display()),
        data_home: paths.data_home.clone(),
        port_bases: config.daemon.port_bases(),
        unix_rbac: config.rbac.enabled,
        ..EngineConfig::default()
    };
    let engine = Engine::new(store.clone(), hub.clone(), auth.clone(), spawner, engine_config);

    let state = AppState::new(
        store,
        engine.clone(),
        hub,
        auth,
        config,
        paths.data_home.clone(),
    );
    state.install_registry(Arc::new(build_registry(&state)));

    // Repair state orphaned by a crash before accepting work.
    let report = engine.startup_sweep().await;
    if report != Default::default() {
        info!(tasks = report.tasks_failed, worktrees = report.worktrees_failed, "startup sweep repaired state");
    }

    crate::gateway::refresh_active_flag(&state);
    crate::gateway::start_push_listeners(&state).await;

    // A stale socket from a dead daemon blocks bind.
    if paths.socket_path.exists() {
        std::fs::remove_file(&paths.socket_path)?;
    }
    let listener = UnixListener::bind(&paths.socket_path)?;
    let mut permissions = std::fs::metadata(&paths.socket_path)?.permissions();
    permissions.set_mode(0o660);
    std::fs::set_permissions(&paths.socket_path, permissions)?;

    info!(socket = %paths.socket_path.display(), "daemon ready");
    Ok(StartupResult {
        state,
        listener: Some(listener),
        shutdown: CancellationToken::new(),
        paths,
        lock_file,
    })
}

/// All services, registered by name.
pub fn build_registry<C: Clock + 'static>(
    state: &Arc<AppState<C>>,
) -> services::ServiceRegistry<C> {
    let registry = services::ServiceRegistry::empty();
    registry.register(services::users::UsersService::new(state.clone()));
    registry.register(services::repos::ReposService::new(state.clone()));
    registry.register(services::worktrees::WorktreesService::new(state.clone()));
    registry.register(services::boards::BoardsService::new(state.clone()));
    registry.register(services::sessions::SessionsService::new(state.clone()));
    registry.register(services::tasks::TasksService::new(state.clone()));
    registry.register(services::messages::MessagesService::new(state.clone()));
    registry.register(services::mcp_servers::McpServersService::new(state.clone()));
    registry.register(services::gateway_messages::GatewayChannelsService::new(state.clone()));
    registry.register(services::gateway_messages::GatewayMessagesService::new(state.clone()));
    registry.register(services::config_service::ConfigService::new(state.clone()));
    registry.register(services::terminals::TerminalsService::new(state.clone()));
    registry
}

/// Graceful shutdown: abort executors, close listeners, checkpoint.
pub async fn shutdown<C: Clock + 'static>(result: &StartupResult<C>) {
    info!("shutting down");
    result.shutdown.cancel();
    result.state.engine.abort_all().await;
    crate::gateway::stop_all_listeners(&result.state).await;
    if let Err(e) = result.state.store.checkpoint() {
        tracing::warn!(error = %e, "final checkpoint failed");
    }
    let _ = std::fs::remove_file(&result.paths.socket_path);
    let _ = std::fs::remove_file(&result.paths.pid_path);
}

fn load_or_create_secret(paths: &DaemonPaths) -> Result<String, LifecycleError> {
    if paths.secret_path.exists() {
        return Ok(std::fs::read_to_string(&paths.secret_path)?.trim().to_string());
    }
    let secret = AuthService::generate_secret();
    std::fs::write(&paths.secret_path, &secret)?;
    let mut permissions = std::fs::metadata(&paths.secret_path)?.permissions();
    permissions.set_mode(0o600);
    std::fs::set_permissions(&paths.secret_path, permissions)?;
    Ok(secret)
}

fn executor_bin_path(config: &DaemonConfig) -> std::path::PathBuf {
    if let Some(bin) = &config.execution.executor_bin {
        return bin.into();
    }
    // Default: sibling of the running agord binary.
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("agor-executor")))
        .unwrap_or_else(|| "agor-executor".into())
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
