// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! R1 — worktree create then remove leaves no row behind, with the
//! executor's half of the protocol simulated over the services.

use super::helpers::{wait_for, world};
use agor_core::{FilesystemStatus, Worktree, WorktreeOwner};
use agor_daemon::hooks::Principal;
use agor_wire::{ExecutorAction, Request, Response};
use serde_json::json;

#[tokio::test]
async fn create_then_remove_leaves_nothing() {
    let w = world();

    // Create through the service; the daemon dispatches git.worktree.add.
    let created = match w
        .dispatch(
            w.as_alice(),
            Request::Create {
                service: "worktrees".into(),
                data: json!({
                    "repo_id": w.repo.repo_id,
                    "name": "feat-y",
                    "new_branch": true,
                }),
            },
        )
        .await
    {
        Response::Record { data } => data,
        other => panic!("create failed: {other:?}"),
    };
    let worktree_id = created["worktree_id"].as_str().unwrap().to_string();
    assert_eq!(created["filesystem_status"], "creating");
    match w.spawner.last_request().payload.action {
        ExecutorAction::WorktreeAdd(add) => assert_eq!(add.worktree_name, "feat-y"),
        other => panic!("expected worktree add dispatch, got {other:?}"),
    }

    // The executor reports success: row goes ready.
    let patched = match w
        .dispatch(
            Principal::Internal { user: None },
            Request::Patch {
                service: "worktrees".into(),
                id: worktree_id.clone(),
                data: json!({"filesystem_status": "ready"}),
            },
        )
        .await
    {
        Response::Record { data } => data,
        other => panic!("ready patch failed: {other:?}"),
    };
    assert_eq!(patched["filesystem_status"], "ready");
    w.spawner.control(0).exit(0, None);

    // Owner asks for removal; the daemon dispatches git.worktree.remove.
    let removing = match w
        .dispatch(
            w.as_alice(),
            Request::Remove { service: "worktrees".into(), id: worktree_id.clone() },
        )
        .await
    {
        Response::Record { data } => data,
        other => panic!("remove failed: {other:?}"),
    };
    assert_eq!(removing["removing"], true);
    let spawner = w.spawner.clone();
    wait_for(|| spawner.requests.lock().len() == 2).await;
    match w.spawner.last_request().payload.action {
        ExecutorAction::WorktreeRemove(remove) => {
            assert_eq!(remove.worktree_id.as_str(), worktree_id)
        }
        other => panic!("expected worktree remove dispatch, got {other:?}"),
    }

    // The executor deletes the row once the filesystem is gone.
    match w
        .dispatch(
            Principal::Internal { user: None },
            Request::Remove { service: "worktrees".into(), id: worktree_id.clone() },
        )
        .await
    {
        Response::Record { .. } => {}
        other => panic!("row removal failed: {other:?}"),
    }
    w.spawner.control(1).exit(0, None);

    // No row, no owner junction rows.
    assert!(w.state.store.maybe_get::<Worktree>(&worktree_id).is_none());
    assert!(w
        .state
        .store
        .all::<WorktreeOwner>()
        .iter()
        .all(|o| o.worktree_id.as_str() != worktree_id));
}

#[tokio::test]
async fn executor_failure_marks_creating_row_failed() {
    let w = world();
    let created = match w
        .dispatch(
            w.as_alice(),
            Request::Create {
                service: "worktrees".into(),
                data: json!({"repo_id": w.repo.repo_id, "name": "doomed"}),
            },
        )
        .await
    {
        Response::Record { data } => data,
        other => panic!("create failed: {other:?}"),
    };
    let worktree_id = created["worktree_id"].as_str().unwrap().to_string();

    w.spawner.control(0).exit_with_stderr(128, "fatal: bad ref");
    let store = w.state.store.clone();
    wait_for(move || {
        store
            .maybe_get::<Worktree>(&worktree_id)
            .is_some_and(|wt| wt.filesystem_status == FilesystemStatus::Failed)
    })
    .await;
}
