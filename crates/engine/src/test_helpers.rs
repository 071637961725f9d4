// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use crate::spawn::{ExecutorExit, ExecutorHandle, ExecutorSpawner, SpawnRequest};
use crate::{Engine, EngineConfig, EventSink, TokenMinter};
use agor_core::test_support::{RepoBuilder, SessionBuilder, UserBuilder, WorktreeBuilder};
use agor_core::{AgorError, ErrorKind, Event, FakeClock, Repo, Session, User, Worktree};
use agor_storage::Store;
use agor_wire::ExecutorResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { events: Mutex::new(Vec::new()) })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(Event::name).collect()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: Event) {
        self.events.lock().push(event);
    }
}

pub struct StaticTokens;

impl TokenMinter for StaticTokens {
    fn mint_executor_token(&self, user_id: &str, task_id: &str) -> String {
        format!("test-token:{user_id}:{task_id}")
    }
}

/// Remote control for one fake executor.
pub struct FakeExecControl {
    exit_tx: Mutex<Option<oneshot::Sender<ExecutorExit>>>,
    pub stop_seen: Arc<AtomicBool>,
}

impl FakeExecControl {
    /// Make the fake executor exit now.
    pub fn exit(&self, code: i32, result: Option<ExecutorResult>) {
        if let Some(tx) = self.exit_tx.lock().take() {
            let _ = tx.send(ExecutorExit { code, stderr: String::new(), result });
        }
    }

    pub fn exit_with_stderr(&self, code: i32, stderr: &str) {
        if let Some(tx) = self.exit_tx.lock().take() {
            let _ = tx.send(ExecutorExit { code, stderr: stderr.to_string(), result: None });
        }
    }
}

/// Scripted spawner: every spawn yields a handle the test controls.
pub struct FakeSpawner {
    pub requests: Mutex<Vec<SpawnRequest>>,
    pub controls: Mutex<Vec<Arc<FakeExecControl>>>,
    /// When set, cooperative stop makes the fake executor exit 0.
    pub exit_on_stop: AtomicBool,
    pub fail_next: AtomicBool,
}

impl FakeSpawner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            controls: Mutex::new(Vec::new()),
            exit_on_stop: AtomicBool::new(true),
            fail_next: AtomicBool::new(false),
        })
    }

    pub fn control(&self, index: usize) -> Arc<FakeExecControl> {
        self.controls.lock()[index].clone()
    }

    pub fn last_request(&self) -> SpawnRequest {
        self.requests.lock().last().cloned().unwrap_or_else(|| panic!("no spawns recorded"))
    }
}

#[async_trait]
impl ExecutorSpawner for FakeSpawner {
    async fn spawn(&self, request: SpawnRequest) -> Result<Arc<ExecutorHandle>, AgorError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AgorError::new(ErrorKind::ExecutorSpawnFailed, "scripted spawn failure"));
        }
        self.requests.lock().push(request);

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let (exit_tx, exit_rx) = oneshot::channel();
        let stop_seen = Arc::new(AtomicBool::new(false));
        let control = Arc::new(FakeExecControl {
            exit_tx: Mutex::new(Some(exit_tx)),
            stop_seen: stop_seen.clone(),
        });
        self.controls.lock().push(control.clone());

        let exit_on_stop = self.exit_on_stop.load(Ordering::SeqCst);
        tokio::spawn(async move {
            if stop_rx.recv().await.is_some() {
                stop_seen.store(true, Ordering::SeqCst);
                if exit_on_stop {
                    control.exit(0, None);
                }
            }
        });

        Ok(ExecutorHandle::new(None, stop_tx, exit_rx))
    }
}

/// A full engine over a tempdir store with seeded user/repo/worktree/session.
pub struct EngineFixture {
    pub engine: Arc<Engine<FakeClock>>,
    pub sink: Arc<RecordingSink>,
    pub spawner: Arc<FakeSpawner>,
    pub user: User,
    pub repo: Repo,
    pub worktree: Worktree,
    pub session: Session,
    _dir: tempfile::TempDir,
}

pub fn fixture() -> EngineFixture {
    fixture_with(EngineConfig {
        stop_grace: std::time::Duration::from_millis(30),
        kill_grace: std::time::Duration::from_millis(30),
        ..EngineConfig::default()
    })
}

pub fn fixture_with(config: EngineConfig) -> EngineFixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open_in(dir.path(), FakeClock::new()).unwrap();

    let user = store
        .create(UserBuilder::default().email("alice@example.com").unix_username("alice").build())
        .unwrap();
    let mut seeded_repo = RepoBuilder::default().slug("acme/widgets").build();
    // The fixture worktree below takes unique id 0.
    seeded_repo.next_worktree_unique_id = 1;
    let repo = store.create(seeded_repo).unwrap();
    let worktree = store
        .create(
            WorktreeBuilder::default()
                .repo(repo.repo_id.clone())
                .name("feat-x")
                .created_by(user.user_id.clone())
                .path(dir.path().join("wt"))
                .build(),
        )
        .unwrap();
    let session = store
        .create(
            SessionBuilder::default()
                .worktree(worktree.worktree_id.clone())
                .created_by(user.user_id.clone())
                .unix_username("alice")
                .build(),
        )
        .unwrap();

    let sink = RecordingSink::new();
    let spawner = FakeSpawner::new();
    let engine =
        Engine::new(store, sink.clone(), Arc::new(StaticTokens), spawner.clone(), config);

    EngineFixture { engine, sink, spawner, user, repo, worktree, session, _dir: dir }
}

/// Poll until `predicate` or the timeout elapses.
pub async fn wait_for(mut predicate: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while !predicate() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached in time");
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}
