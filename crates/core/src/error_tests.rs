// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    not_found = { ErrorKind::NotFound, "not-found" },
    busy = { ErrorKind::SessionBusy, "session-busy" },
    ambiguous = { ErrorKind::AmbiguousIdPrefix, "ambiguous-id-prefix" },
    migration = { ErrorKind::MigrationPending, "migration-pending" },
)]
fn kind_codes_are_stable(kind: ErrorKind, code: &str) {
    assert_eq!(kind.code(), code);
}

#[test]
fn error_round_trips_through_json() {
    let err = AgorError::new(ErrorKind::GitError, "clone failed")
        .with_details(serde_json::json!({"exit_code": 128}));
    let json = serde_json::to_string(&err).unwrap();
    let parsed: AgorError = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, err);
}

#[test]
fn ambiguous_prefix_lists_at_most_three() {
    let matches: Vec<String> =
        ["aaa1", "aaa2", "aaa3", "aaa4", "aaa5"].iter().map(|s| s.to_string()).collect();
    let err = AgorError::ambiguous_prefix("aaa", &matches);
    assert!(err.message.contains("aaa1"));
    assert!(err.message.contains("aaa3"));
    assert!(!err.message.contains("aaa4"));
    assert!(err.message.contains('…'));
}

#[test]
fn ambiguous_prefix_without_overflow_has_no_ellipsis() {
    let matches: Vec<String> = ["aaa1", "aaa2"].iter().map(|s| s.to_string()).collect();
    let err = AgorError::ambiguous_prefix("aaa", &matches);
    assert!(!err.message.contains('…'));
}

#[test]
fn details_are_omitted_when_none() {
    let err = AgorError::not_found("worktree");
    let json = serde_json::to_string(&err).unwrap();
    assert!(!json.contains("details"));
}
