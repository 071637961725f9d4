// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for daemon tests: a fully wired AppState over a
//! tempdir store, scripted executors, and a fake gateway connector.

use crate::auth::{hash_password, AuthService};
use crate::channels::ChannelHub;
use crate::config::DaemonConfig;
use crate::lifecycle::build_registry;
use crate::state::AppState;
use agor_adapters::FakeConnector;
use agor_core::test_support::{RepoBuilder, SessionBuilder, UserBuilder, WorktreeBuilder};
use agor_core::{Clock, FakeClock, Repo, Role, Session, User, Worktree};
use agor_engine::test_helpers::FakeSpawner;
use agor_engine::{Engine, EngineConfig};
use agor_storage::Store;
use std::sync::Arc;

pub struct DaemonFixture {
    pub state: Arc<AppState<FakeClock>>,
    pub spawner: Arc<FakeSpawner>,
    pub connector: Arc<FakeConnector>,
    pub admin: User,
    pub alice: User,
    pub repo: Repo,
    pub worktree: Worktree,
    pub session: Session,
    _dir: tempfile::TempDir,
}

pub const ALICE_PASSWORD: &str = "correct horse";

pub fn fixture() -> DaemonFixture {
    fixture_with(DaemonConfig::default())
}

pub fn fixture_with(config: DaemonConfig) -> DaemonFixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open_in(dir.path(), FakeClock::new()).unwrap();

    let mut admin = UserBuilder::default()
        .email("root@example.com")
        .role(Role::Owner)
        .unix_username("root_agor")
        .build();
    admin.password_hash = hash_password("admin-pass").unwrap();
    let admin = store.create(admin).unwrap();

    let mut alice = UserBuilder::default()
        .email("alice@example.com")
        .role(Role::Member)
        .unix_username("alice")
        .build();
    alice.password_hash = hash_password(ALICE_PASSWORD).unwrap();
    let alice = store.create(alice).unwrap();

    let mut seeded_repo = RepoBuilder::default().slug("acme/widgets").build();
    seeded_repo.next_worktree_unique_id = 1;
    let repo = store.create(seeded_repo).unwrap();
    let worktree = store
        .create(
            WorktreeBuilder::default()
                .repo(repo.repo_id.clone())
                .name("feat-x")
                .created_by(alice.user_id.clone())
                .path(dir.path().join("wt"))
                .build(),
        )
        .unwrap();
    store
        .create(agor_core::WorktreeOwner {
            worktree_id: worktree.worktree_id.clone(),
            user_id: alice.user_id.clone(),
            created_at: store.clock().utc_now(),
        })
        .unwrap();
    let session = store
        .create(
            SessionBuilder::default()
                .worktree(worktree.worktree_id.clone())
                .created_by(alice.user_id.clone())
                .unix_username("alice")
                .build(),
        )
        .unwrap();

    let auth = Arc::new(AuthService::new("test-secret", 24));
    let hub = Arc::new(ChannelHub::new());
    let spawner = FakeSpawner::new();
    let engine_config = EngineConfig {
        stop_grace: std::time::Duration::from_millis(30),
        kill_grace: std::time::Duration::from_millis(30),
        unix_rbac: config.rbac.enabled,
        daemon_user: config.rbac.daemon_user.clone(),
        impersonation: config.execution.impersonation.clone(),
        ..EngineConfig::default()
    };
    let engine =
        Engine::new(store.clone(), hub.clone(), auth.clone(), spawner.clone(), engine_config);

    let state =
        AppState::new(store, engine, hub, auth, config, dir.path().to_path_buf());
    state.install_registry(Arc::new(build_registry(&state)));

    let connector = FakeConnector::new("test");
    state.gateway.register_connector(connector.clone());

    DaemonFixture {
        state,
        spawner,
        connector,
        admin,
        alice,
        repo,
        worktree,
        session,
        _dir: dir,
    }
}

impl DaemonFixture {
    pub fn as_user(&self, user: &User) -> crate::hooks::Principal {
        crate::hooks::Principal::User(user.clone())
    }

    pub async fn call(
        &self,
        principal: crate::hooks::Principal,
        request: agor_wire::Request,
    ) -> agor_wire::Response {
        self.state.registry().dispatch(&self.state.hub, principal, request).await
    }
}
