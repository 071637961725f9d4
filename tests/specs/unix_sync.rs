// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario 6 — unix.sync-worktree idempotence with two owners.

use agor_adapters::FakeUnixHost;
use agor_core::OthersFsAccess;
use agor_engine::unix_sync::{sync_worktree, WorktreeSyncView};

#[tokio::test]
async fn two_owner_sync_is_idempotent() {
    let host = FakeUnixHost::new();
    for user in ["alice", "bob", "agor"] {
        host.add_user(user);
    }
    let view = WorktreeSyncView {
        group: "agor_wt_0192f0c1".into(),
        path: "/srv/agor/worktrees/acme/widgets/feat-x".into(),
        worktree_name: "feat-x".into(),
        owners: vec!["alice".into(), "bob".into()],
        daemon_user: Some("agor".into()),
        others_fs_access: OthersFsAccess::Read,
        git_metadata_dir: None,
        owner_homes: vec![
            ("alice".into(), "/home/alice".into()),
            ("bob".into(), "/home/bob".into()),
        ],
    };

    // Both runs exit success.
    sync_worktree(&host, &view, false).await.unwrap();
    let first = host.model();
    sync_worktree(&host, &view, false).await.unwrap();
    let second = host.model();

    // `getent group agor_wt_<id>` lists alice, bob, and the daemon
    // exactly once each, after either run.
    assert_eq!(first, second);
    assert_eq!(host.members("agor_wt_0192f0c1"), vec!["agor", "alice", "bob"]);

    // Membership is a set: no duplicates even after a third run.
    sync_worktree(&host, &view, false).await.unwrap();
    let members = host.members("agor_wt_0192f0c1");
    assert_eq!(members.len(), 3);
}
