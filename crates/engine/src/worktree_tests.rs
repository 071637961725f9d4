// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{fixture, fixture_with, wait_for};
use crate::EngineConfig;

fn params(fx: &crate::test_helpers::EngineFixture, name: &str) -> CreateWorktreeParams {
    CreateWorktreeParams {
        repo: fx.repo.repo_id.to_string(),
        name: name.into(),
        ref_name: None,
        ref_type: RefType::Branch,
        base_ref: None,
        create_branch: true,
        created_by: fx.user.user_id.clone(),
        others_can: OthersCan::None,
        others_fs_access: OthersFsAccess::None,
        board_id: None,
    }
}

#[tokio::test]
async fn create_inserts_row_owner_and_dispatches_add() {
    let fx = fixture();
    let worktree = fx.engine.create_worktree(params(&fx, "feat-y")).await.unwrap();

    assert_eq!(worktree.filesystem_status, FilesystemStatus::Creating);
    assert!(worktree.path.ends_with("worktrees/acme/widgets/feat-y"));
    assert_eq!(worktree.base_ref.as_deref(), Some("main"));
    assert!(worktree.new_branch);

    // Owner junction row exists.
    let owners: Vec<WorktreeOwner> = fx.engine.store.all();
    assert!(owners
        .iter()
        .any(|o| o.worktree_id == worktree.worktree_id && o.user_id == fx.user.user_id));

    // The executor payload describes the add.
    let request = fx.spawner.last_request();
    match request.payload.action {
        ExecutorAction::WorktreeAdd(add) => {
            assert_eq!(add.worktree_name, "feat-y");
            assert!(add.create_branch);
            assert_eq!(add.source_branch.as_deref(), Some("main"));
        }
        other => panic!("expected worktree add, got {other:?}"),
    }
    // Git ops never impersonate; they sudo to the daemon user when set.
    assert!(request.run_as.is_none());
}

#[tokio::test]
async fn unique_ids_are_monotonic_per_repo() {
    let fx = fixture();
    let a = fx.engine.create_worktree(params(&fx, "a")).await.unwrap();
    let b = fx.engine.create_worktree(params(&fx, "b")).await.unwrap();

    // The fixture worktree took id 0 at build time without touching the
    // allocator; engine-created ones allocate monotonically.
    assert_eq!(b.worktree_unique_id, a.worktree_unique_id + 1);

    let (ssh_a, app_a) = fx.engine.worktree_ports(&a);
    let (ssh_b, app_b) = fx.engine.worktree_ports(&b);
    assert_ne!(ssh_a, ssh_b);
    assert_ne!(app_a, app_b);
}

#[tokio::test]
async fn duplicate_name_in_repo_conflicts() {
    let fx = fixture();
    fx.engine.create_worktree(params(&fx, "dup")).await.unwrap();
    let err = fx.engine.create_worktree(params(&fx, "dup")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[tokio::test]
async fn rbac_assigns_deterministic_group() {
    let config = EngineConfig { unix_rbac: true, ..EngineConfig::default() };
    let fx = fixture_with(config);
    let worktree = fx.engine.create_worktree(params(&fx, "grp")).await.unwrap();
    assert_eq!(
        worktree.unix_group.as_deref(),
        Some(format!("agor_wt_{}", worktree.worktree_id.short()).as_str())
    );
}

#[tokio::test]
async fn failed_executor_marks_row_failed() {
    let fx = fixture();
    let worktree = fx.engine.create_worktree(params(&fx, "doomed")).await.unwrap();
    fx.spawner.control(0).exit_with_stderr(128, "fatal: not a git repository");

    let store = fx.engine.store.clone();
    let id = worktree.worktree_id.clone();
    wait_for(|| {
        store
            .maybe_get::<Worktree>(id.as_str())
            .is_some_and(|w| w.filesystem_status == FilesystemStatus::Failed)
    })
    .await;

    let worktree: Worktree = fx.engine.store.get(worktree.worktree_id.as_str()).unwrap();
    assert!(worktree.last_error.is_some());
}

#[tokio::test]
async fn successful_executor_leaves_ready_patch_alone() {
    let fx = fixture();
    let worktree = fx.engine.create_worktree(params(&fx, "good")).await.unwrap();

    // The executor patches ready through the service, then exits 0.
    fx.engine
        .store
        .patch::<Worktree>(
            worktree.worktree_id.as_str(),
            serde_json::json!({"filesystem_status": FilesystemStatus::Ready}),
        )
        .unwrap();
    fx.spawner.control(0).exit(0, None);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let worktree: Worktree = fx.engine.store.get(worktree.worktree_id.as_str()).unwrap();
    assert_eq!(worktree.filesystem_status, FilesystemStatus::Ready);
}

#[tokio::test]
async fn remove_dispatches_removal_payload() {
    let fx = fixture();
    fx.engine
        .remove_worktree(fx.worktree.worktree_id.as_str(), &fx.user.user_id, false)
        .await
        .unwrap();

    let request = fx.spawner.last_request();
    match request.payload.action {
        ExecutorAction::WorktreeRemove(remove) => {
            assert_eq!(remove.worktree_id, fx.worktree.worktree_id);
            assert_eq!(remove.worktree_path, fx.worktree.path);
        }
        other => panic!("expected worktree remove, got {other:?}"),
    }
}
