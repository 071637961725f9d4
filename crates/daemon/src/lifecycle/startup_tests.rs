// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::lifecycle::{DaemonPaths, LifecycleError};
use agor_core::FakeClock;
use agor_engine::test_helpers::FakeSpawner;
use serial_test::serial;

async fn boot(dir: &std::path::Path) -> Result<StartupResult<FakeClock>, LifecycleError> {
    startup(DaemonPaths::new(dir.to_path_buf()), FakeClock::new(), FakeSpawner::new()).await
}

#[tokio::test]
#[serial]
async fn startup_writes_pid_and_binds_socket() {
    let dir = tempfile::tempdir().unwrap();
    let daemon = boot(dir.path()).await.unwrap();

    // Single decimal PID.
    let pid: u32 = std::fs::read_to_string(&daemon.paths.pid_path)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(pid, std::process::id());
    assert!(daemon.paths.socket_path.exists());
    assert!(daemon.paths.data_home.join("repos").is_dir());
    assert!(daemon.paths.data_home.join("worktrees").is_dir());

    // The signing secret is persisted 0600.
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(&daemon.paths.secret_path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);

    shutdown(&daemon).await;
    assert!(!daemon.paths.socket_path.exists());
    assert!(!daemon.paths.pid_path.exists());
}

#[tokio::test]
#[serial]
async fn second_daemon_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let first = boot(dir.path()).await.unwrap();

    let second = boot(dir.path()).await;
    assert!(matches!(second, Err(LifecycleError::AlreadyRunning(_))));

    shutdown(&first).await;
}

#[tokio::test]
#[serial]
async fn newer_snapshot_blocks_startup_with_migration_pending() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db");
    std::fs::create_dir_all(&db).unwrap();
    let snapshot = serde_json::json!({
        "schema_version": agor_storage::SCHEMA_VERSION + 1,
        "state": {"tables": {}},
    });
    let bytes = serde_json::to_vec(&snapshot).unwrap();
    std::fs::write(db.join("snapshot.json.zst"), zstd::encode_all(bytes.as_slice(), 3).unwrap())
        .unwrap();

    let result = boot(dir.path()).await;
    match result {
        Err(LifecycleError::MigrationPending(message)) => {
            assert!(message.contains("newer"));
        }
        other => panic!("expected migration pending, got {:?}", other.is_ok()),
    }
}

#[tokio::test]
#[serial]
async fn startup_sweeps_orphaned_state() {
    let dir = tempfile::tempdir().unwrap();
    // Seed a pending task directly into a store, then reopen via startup.
    {
        let store = agor_storage::Store::open_in(dir.path(), FakeClock::new()).unwrap();
        let session =
            store.create(agor_core::test_support::SessionBuilder::default().build()).unwrap();
        let task = store
            .create(
                agor_core::test_support::TaskBuilder::default()
                    .session(session.session_id.clone())
                    .build(),
            )
            .unwrap();
        store
            .update::<agor_core::Session>(session.session_id.as_str(), |s| {
                s.tasks.push(task.task_id.clone())
            })
            .unwrap();
    }

    let daemon = boot(dir.path()).await.unwrap();
    let tasks = daemon.state.store.all::<agor_core::Task>();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, agor_core::TaskStatus::Failed);
    shutdown(&daemon).await;
}
