// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared daemon state handed to services.

use crate::auth::AuthService;
use crate::channels::ChannelHub;
use crate::config::DaemonConfig;
use crate::gateway::GatewayState;
use crate::services::terminals::TerminalRegistry;
use crate::services::ServiceRegistry;
use agor_core::{Clock, SystemClock};
use agor_engine::Engine;
use agor_storage::Store;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Everything a service can reach. The service registry is installed
/// after construction (services hold `Arc<AppState>`, the registry holds
/// the services — the lazy slot breaks the construction cycle).
pub struct AppState<C: Clock + 'static> {
    pub store: Arc<Store<C>>,
    pub engine: Arc<Engine<C>>,
    pub hub: Arc<ChannelHub>,
    pub auth: Arc<AuthService>,
    pub config: DaemonConfig,
    pub data_home: PathBuf,
    pub gateway: GatewayState,
    pub terminals: TerminalRegistry,
    pub start_time: Instant,
    registry: RwLock<Option<Arc<ServiceRegistry<C>>>>,
}

/// The production daemon state.
pub type DaemonState = AppState<SystemClock>;

impl<C: Clock + 'static> AppState<C> {
    pub fn new(
        store: Arc<Store<C>>,
        engine: Arc<Engine<C>>,
        hub: Arc<ChannelHub>,
        auth: Arc<AuthService>,
        config: DaemonConfig,
        data_home: PathBuf,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            engine,
            hub,
            auth,
            config,
            data_home,
            gateway: GatewayState::default(),
            terminals: TerminalRegistry::default(),
            start_time: Instant::now(),
            registry: RwLock::new(None),
        })
    }

    /// Lazy registry lookup (resolves service-to-service cycles).
    pub fn registry(&self) -> Arc<ServiceRegistry<C>> {
        self.registry
            .read()
            .clone()
            .unwrap_or_else(|| Arc::new(ServiceRegistry::empty()))
    }

    pub fn install_registry(&self, registry: Arc<ServiceRegistry<C>>) {
        *self.registry.write() = Some(registry);
    }

    /// Fire-and-forget executor dispatch for privileged host actions
    /// (unix sync, repo clone). Failures are logged, not surfaced — the
    /// protocols are idempotent and safe to retry.
    pub async fn dispatch_executor(
        &self,
        mut payload: agor_wire::ExecutorPayload,
    ) -> Result<(), agor_core::AgorError> {
        payload.daemon_url =
            Some(format!("unix:{}", self.data_home.join("daemon.sock").display()));
        payload.data_home = Some(self.data_home.clone());
        let command = payload.command();
        let request = agor_engine::SpawnRequest { payload, run_as: None, sudo_self_as: None };
        let handle = self.engine.spawner.spawn(request).await?;
        tokio::spawn(async move {
            let exit = handle.wait().await;
            if !exit.success() {
                tracing::warn!(command, code = exit.code, stderr = %exit.stderr, "executor dispatch failed");
            }
        });
        Ok(())
    }
}
