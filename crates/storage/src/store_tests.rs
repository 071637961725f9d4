// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use agor_core::test_support::{RepoBuilder, SessionBuilder, TaskBuilder, UserBuilder};
use agor_core::{FakeClock, Repo, Session, Task, TaskStatus, User};
use serde_json::json;
use tempfile::tempdir;

fn store() -> (tempfile::TempDir, Arc<Store<FakeClock>>) {
    let dir = tempdir().unwrap();
    let store = Store::open_in(dir.path(), FakeClock::new()).unwrap();
    (dir, store)
}

#[test]
fn create_get_remove_round_trip() {
    let (_dir, store) = store();
    let user = store.create(UserBuilder::default().email("alice@example.com").build()).unwrap();

    let fetched: User = store.get(user.user_id.as_str()).unwrap();
    assert_eq!(fetched.email, "alice@example.com");

    let removed: User = store.remove(user.user_id.as_str()).unwrap();
    assert_eq!(removed.user_id, user.user_id);
    assert!(store.get::<User>(user.user_id.as_str()).is_err());
}

#[test]
fn duplicate_email_is_a_conflict() {
    let (_dir, store) = store();
    store.create(UserBuilder::default().email("a@b.c").build()).unwrap();
    let err = store.create(UserBuilder::default().email("a@b.c").build()).unwrap_err();
    assert_eq!(err.kind, agor_core::ErrorKind::Conflict);
}

#[test]
fn duplicate_slug_is_a_conflict() {
    let (_dir, store) = store();
    store.create(RepoBuilder::default().slug("acme/widgets").build()).unwrap();
    let err = store.create(RepoBuilder::default().slug("acme/widgets").build()).unwrap_err();
    assert_eq!(err.kind, agor_core::ErrorKind::Conflict);
}

#[test]
fn short_id_prefix_lookup_matches_full_lookup() {
    let (_dir, store) = store();
    let repo = store.create(RepoBuilder::default().build()).unwrap();

    let by_prefix: Repo = store.get(&repo.repo_id.as_str()[..8]).unwrap();
    let by_full: Repo = store.get(repo.repo_id.as_str()).unwrap();
    assert_eq!(by_prefix, by_full);
}

#[test]
fn ambiguous_prefix_lists_matches() {
    let (_dir, store) = store();
    // Force two tasks whose IDs share a prefix.
    let mut a = TaskBuilder::default().build();
    a.task_id = agor_core::TaskId::from_string("aaaa1111-0000-7000-8000-000000000001");
    let mut b = TaskBuilder::default().build();
    b.task_id = agor_core::TaskId::from_string("aaaa1111-0000-7000-8000-000000000002");
    store.create(a).unwrap();
    store.create(b).unwrap();

    let err = store.get::<Task>("aaaa1111").unwrap_err();
    assert_eq!(err.kind, agor_core::ErrorKind::AmbiguousIdPrefix);
    assert!(err.message.contains("aaaa1111-0000-7000-8000-000000000001"));
}

#[test]
fn too_short_prefix_is_not_found() {
    let (_dir, store) = store();
    let task = store.create(TaskBuilder::default().build()).unwrap();
    let err = store.get::<Task>(&task.task_id.as_str()[..2]).unwrap_err();
    assert_eq!(err.kind, agor_core::ErrorKind::NotFound);
}

#[test]
fn patch_deep_merges_and_bumps_updated_at() {
    let (_dir, store) = store();
    let clock = store.clock().clone();
    let task = store.create(TaskBuilder::default().build()).unwrap();

    store
        .patch::<Task>(task.task_id.as_str(), json!({"git_state": {"sha_at_start": "abc"}}))
        .unwrap();
    clock.advance(std::time::Duration::from_secs(5));
    let patched: Task = store
        .patch(task.task_id.as_str(), json!({"git_state": {"sha_at_end": "def"}}))
        .unwrap();

    assert_eq!(patched.git_state.sha_at_start.as_deref(), Some("abc"));
    assert_eq!(patched.git_state.sha_at_end.as_deref(), Some("def"));
    assert!(patched.updated_at > task.updated_at);
}

#[test]
fn update_closure_persists() {
    let (_dir, store) = store();
    let session = store.create(SessionBuilder::default().build()).unwrap();

    store
        .update::<Session>(session.session_id.as_str(), |s| {
            s.message_count += 1;
        })
        .unwrap();
    let fetched: Session = store.get(session.session_id.as_str()).unwrap();
    assert_eq!(fetched.message_count, 1);
}

#[test]
fn state_survives_reopen_via_wal() {
    let dir = tempdir().unwrap();
    let task_id;
    {
        let store = Store::open_in(dir.path(), FakeClock::new()).unwrap();
        let task = store
            .create(TaskBuilder::default().status(TaskStatus::Running).build())
            .unwrap();
        task_id = task.task_id;
    }
    let store = Store::open_in(dir.path(), FakeClock::new()).unwrap();
    let task: Task = store.get(task_id.as_str()).unwrap();
    assert_eq!(task.status, TaskStatus::Running);
}

#[test]
fn checkpoint_truncates_wal_and_keeps_state() {
    let dir = tempdir().unwrap();
    let paths = StorePaths::under(dir.path());
    let task_id;
    {
        let store = Store::open(paths.clone(), FakeClock::new()).unwrap();
        task_id = store.create(TaskBuilder::default().build()).unwrap().task_id;
        store.checkpoint().unwrap();
    }
    // WAL is empty; the record lives in the snapshot.
    let replayed = crate::wal::Wal::replay(&paths.wal_path, |_| {}).unwrap();
    assert_eq!(replayed, 0);

    let store = Store::open(paths, FakeClock::new()).unwrap();
    assert!(store.get::<Task>(task_id.as_str()).is_ok());
}
