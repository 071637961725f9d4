// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agor-engine: the session/task execution engine and the worktree /
//! Unix orchestrator.
//!
//! The engine owns the per-session prompt gate (at most one active task
//! per session), executor process lifecycle, cancellation escalation,
//! session-status derivation, and the startup sweeps that repair state
//! after a crash.

pub mod cancel;
pub mod config;
pub mod context;
pub mod gates;
pub mod git;
pub mod prompt;
pub mod spawn;
pub mod sweep;
pub mod unix_sync;
pub mod worktree;

use agor_core::{Clock, Event};
use agor_storage::Store;
use std::sync::Arc;

pub use cancel::StopResult;
pub use config::{EngineConfig, ImpersonationMode};
pub use context::UsageContext;
pub use gates::SessionGates;
pub use spawn::{ExecutorExit, ExecutorHandle, ExecutorSpawner, ProcessSpawner, SpawnRequest};
pub use sweep::SweepReport;
pub use unix_sync::{RepoSyncView, UserSyncView, WorktreeSyncView};
pub use worktree::CreateWorktreeParams;

/// Where engine events go. The daemon wires this to its channel hub;
/// tests record.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: Event);
}

/// Mints short-lived executor JWTs. Implemented by the daemon's auth
/// layer; tests return fixed strings.
pub trait TokenMinter: Send + Sync {
    fn mint_executor_token(&self, user_id: &str, task_id: &str) -> String;
}

/// The session/task engine.
pub struct Engine<C: Clock> {
    pub store: Arc<Store<C>>,
    pub events: Arc<dyn EventSink>,
    pub tokens: Arc<dyn TokenMinter>,
    pub spawner: Arc<dyn ExecutorSpawner>,
    pub config: EngineConfig,
    gates: SessionGates,
    aborts: cancel::AbortRegistry,
}

impl<C: Clock + 'static> Engine<C> {
    pub fn new(
        store: Arc<Store<C>>,
        events: Arc<dyn EventSink>,
        tokens: Arc<dyn TokenMinter>,
        spawner: Arc<dyn ExecutorSpawner>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            events,
            tokens,
            spawner,
            config,
            gates: SessionGates::default(),
            aborts: cancel::AbortRegistry::default(),
        })
    }

    pub fn gates(&self) -> &SessionGates {
        &self.gates
    }

    pub(crate) fn aborts(&self) -> &cancel::AbortRegistry {
        &self.aborts
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_helpers;
