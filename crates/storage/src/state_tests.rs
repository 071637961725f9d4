// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn put_then_patch_then_remove() {
    let mut state = MaterializedState::default();

    state.apply(&Mutation::Put {
        table: Table::Tasks,
        key: "t-1".into(),
        record: json!({"task_id": "t-1", "git_state": {"sha_at_start": "abc"}}),
    });
    state.apply(&Mutation::Patch {
        table: Table::Tasks,
        key: "t-1".into(),
        patch: json!({"git_state": {"sha_at_end": "def"}}),
    });

    let record = state.table(Table::Tasks).unwrap().get("t-1").unwrap();
    assert_eq!(record["git_state"]["sha_at_start"], "abc");
    assert_eq!(record["git_state"]["sha_at_end"], "def");

    state.apply(&Mutation::Remove { table: Table::Tasks, key: "t-1".into() });
    assert_eq!(state.len(Table::Tasks), 0);
}

#[test]
fn patch_on_missing_record_is_noop() {
    let mut state = MaterializedState::default();
    state.apply(&Mutation::Patch {
        table: Table::Sessions,
        key: "ghost".into(),
        patch: json!({"status": "running"}),
    });
    assert_eq!(state.len(Table::Sessions), 0);
}

#[test]
fn state_round_trips_through_serde() {
    let mut state = MaterializedState::default();
    state.apply(&Mutation::Put {
        table: Table::Users,
        key: "u-1".into(),
        record: json!({"user_id": "u-1", "email": "a@b.c"}),
    });

    let json = serde_json::to_string(&state).unwrap();
    let parsed: MaterializedState = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.table(Table::Users).unwrap().len(), 1);
}
