// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::mutation::{Mutation, Table};
use serde_json::json;
use tempfile::tempdir;

#[test]
fn save_then_load_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json.zst");

    let mut state = MaterializedState::default();
    state.apply(&Mutation::Put {
        table: Table::Repos,
        key: "r-1".into(),
        record: json!({"repo_id": "r-1", "slug": "acme/widgets"}),
    });

    Snapshot::save(&path, &state).unwrap();
    let loaded = Snapshot::load(&path).unwrap();
    assert_eq!(loaded.len(Table::Repos), 1);
    assert_eq!(Snapshot::version_on_disk(&path).unwrap(), Some(SCHEMA_VERSION));
}

#[test]
fn missing_snapshot_is_empty_state() {
    let dir = tempdir().unwrap();
    let state = Snapshot::load(&dir.path().join("none.zst")).unwrap();
    assert!(state.is_empty());
}

fn write_raw(path: &std::path::Path, snapshot: &serde_json::Value) {
    let bytes = serde_json::to_vec(snapshot).unwrap();
    std::fs::write(path, zstd::encode_all(bytes.as_slice(), 3).unwrap()).unwrap();
}

#[test]
fn newer_schema_blocks_with_migration_pending() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json.zst");
    write_raw(&path, &json!({"schema_version": SCHEMA_VERSION + 1, "state": {"tables": {}}}));

    let err = Snapshot::load(&path).unwrap_err();
    assert!(matches!(err, SnapshotError::MigrationPending { .. }));
}

#[test]
fn v1_owner_arrays_migrate_into_junction() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json.zst");
    write_raw(
        &path,
        &json!({
            "schema_version": 1,
            "state": {"tables": {"worktrees": {"w-1": {
                "worktree_id": "w-1",
                "owners": ["u-1", "u-2"],
                "created_at": "2026-01-01T00:00:00Z",
            }}}},
        }),
    );

    let state = Snapshot::load(&path).unwrap();
    let owners = state.table(Table::WorktreeOwners).unwrap();
    assert_eq!(owners.len(), 2);
    let row = owners.get("w-1:u-1").unwrap();
    assert_eq!(row["user_id"], "u-1");

    // The legacy array is gone from the worktree row.
    let worktree = state.table(Table::Worktrees).unwrap().get("w-1").unwrap();
    assert!(worktree.get("owners").is_none());
}
