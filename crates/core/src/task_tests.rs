// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    pending = { TaskStatus::Pending, false },
    running = { TaskStatus::Running, false },
    awaiting = { TaskStatus::AwaitingPermission, false },
    completed = { TaskStatus::Completed, true },
    failed = { TaskStatus::Failed, true },
    stopped = { TaskStatus::Stopped, true },
)]
fn terminal_states(status: TaskStatus, terminal: bool) {
    assert_eq!(status.is_terminal(), terminal);
}

#[test]
fn describe_takes_first_line() {
    assert_eq!(Task::describe("write hello.txt\nand more"), "write hello.txt");
}

#[test]
fn describe_truncates_long_prompts() {
    let prompt = "x".repeat(200);
    let description = Task::describe(&prompt);
    assert!(description.chars().count() <= 81);
    assert!(description.ends_with('…'));
}

#[test]
fn describe_respects_char_boundaries() {
    let prompt = "é".repeat(100);
    let description = Task::describe(&prompt);
    assert!(description.ends_with('…'));
}

#[test]
fn git_state_merges_as_nested_object() {
    // The repository layer deep-merges patches; sha_at_end set later must
    // not clobber sha_at_start. This just pins the serde shape.
    let state = GitState { sha_at_start: Some("abc123-dirty".into()), sha_at_end: None };
    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json, serde_json::json!({"sha_at_start": "abc123-dirty"}));
}

#[test]
fn status_serde_is_snake_case() {
    assert_eq!(serde_json::to_string(&TaskStatus::AwaitingPermission).unwrap(), "\"awaiting_permission\"");
}
