// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process daemon assembly for the scenario suite.

use agor_adapters::FakeConnector;
use agor_core::test_support::{RepoBuilder, SessionBuilder, UserBuilder, WorktreeBuilder};
use agor_core::{Clock, FakeClock, Repo, Role, Session, User, Worktree};
use agor_daemon::auth::{hash_password, AuthService};
use agor_daemon::hooks::Principal;
use agor_daemon::lifecycle::build_registry;
use agor_daemon::{AppState, ChannelHub, DaemonConfig};
use agor_engine::test_helpers::FakeSpawner;
use agor_engine::{Engine, EngineConfig};
use agor_storage::Store;
use agor_wire::{Request, Response};
use std::path::Path;
use std::sync::Arc;

pub struct World {
    pub state: Arc<AppState<FakeClock>>,
    pub spawner: Arc<FakeSpawner>,
    pub connector: Arc<FakeConnector>,
    pub alice: User,
    pub repo: Repo,
    pub worktree: Worktree,
    pub session: Session,
    pub dir: tempfile::TempDir,
}

/// Seed: user alice, repo acme/widgets (default branch main), worktree
/// feat-x backed by a real git repository under the tempdir.
pub fn world() -> World {
    let dir = tempfile::tempdir().unwrap();
    let worktree_path = dir.path().join("worktrees").join("feat-x");
    init_git_repo(&worktree_path);

    let store = Store::open_in(dir.path(), FakeClock::new()).unwrap();
    let mut alice = UserBuilder::default()
        .email("alice@example.com")
        .role(Role::Member)
        .unix_username("alice")
        .build();
    alice.password_hash = hash_password("wonderland").unwrap();
    let alice = store.create(alice).unwrap();

    let mut repo = RepoBuilder::default().slug("acme/widgets").default_branch("main").build();
    repo.next_worktree_unique_id = 1;
    let repo = store.create(repo).unwrap();

    let worktree = store
        .create(
            WorktreeBuilder::default()
                .repo(repo.repo_id.clone())
                .name("feat-x")
                .created_by(alice.user_id.clone())
                .path(&worktree_path)
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

    let auth = Arc::new(AuthService::new("spec-secret", 24));
    let hub = Arc::new(ChannelHub::new());
    let spawner = FakeSpawner::new();
    let engine = Engine::new(
        store.clone(),
        hub.clone(),
        auth.clone(),
        spawner.clone(),
        EngineConfig {
            stop_grace: std::time::Duration::from_millis(30),
            kill_grace: std::time::Duration::from_millis(30),
            data_home: dir.path().to_path_buf(),
            ..EngineConfig::default()
        },
    );
    let state = AppState::new(
        store,
        engine,
        hub,
        auth,
        DaemonConfig::default(),
        dir.path().to_path_buf(),
    );
    state.install_registry(Arc::new(build_registry(&state)));

    let connector = FakeConnector::new("test");
    state.gateway.register_connector(connector.clone());

    World { state, spawner, connector, alice, repo, worktree, session, dir }
}

impl World {
    pub fn as_alice(&self) -> Principal {
        Principal::User(self.alice.clone())
    }

    pub async fn dispatch(&self, principal: Principal, request: Request) -> Response {
        self.state.registry().dispatch(&self.state.hub, principal, request).await
    }

    pub async fn call_alice(
        &self,
        service: &str,
        route: &str,
        id: Option<&str>,
        params: serde_json::Value,
    ) -> serde_json::Value {
        match self
            .dispatch(
                self.as_alice(),
                Request::Call {
                    service: service.into(),
                    route: route.into(),
                    id: id.map(str::to_string),
                    params,
                },
            )
            .await
        {
            Response::Record { data } => data,
            other => panic!("{service}/{route} failed: {other:?}"),
        }
    }

    /// Act as the executor process: stream through messages/streaming.
    pub async fn stream(&self, params: serde_json::Value) {
        let response = self
            .dispatch(
                Principal::Internal { user: None },
                Request::Call {
                    service: "messages".into(),
                    route: "streaming".into(),
                    id: None,
                    params,
                },
            )
            .await;
        assert!(matches!(response, Response::Record { .. }), "streaming failed: {response:?}");
    }

    /// Act as the executor process: finalize the task.
    pub async fn finalize(&self, task_id: &str, patch: serde_json::Value) -> serde_json::Value {
        match self
            .dispatch(
                Principal::Internal { user: None },
                Request::Patch { service: "tasks".into(), id: task_id.into(), data: patch },
            )
            .await
        {
            Response::Record { data } => data,
            other => panic!("task finalize failed: {other:?}"),
        }
    }
}

pub fn git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "spec")
        .env("GIT_AUTHOR_EMAIL", "spec@example.com")
        .env("GIT_COMMITTER_NAME", "spec")
        .env("GIT_COMMITTER_EMAIL", "spec@example.com")
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?}");
}

fn init_git_repo(path: &Path) {
    std::fs::create_dir_all(path).unwrap();
    git(path, &["init", "-q", "-b", "main"]);
    std::fs::write(path.join("README.md"), "# widgets\n").unwrap();
    git(path, &["add", "."]);
    git(path, &["commit", "-q", "-m", "init"]);
}

/// Poll until `predicate` holds or five seconds pass.
pub async fn wait_for(mut predicate: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while !predicate() {
        assert!(tokio::time::Instant::now() <= deadline, "condition not reached in time");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}
