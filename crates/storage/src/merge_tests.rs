// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn nested_objects_merge_without_clobbering() {
    let mut target = json!({"git_state": {"sha_at_start": "abc-dirty"}});
    deep_merge(&mut target, &json!({"git_state": {"sha_at_end": "def"}}));
    assert_eq!(
        target,
        json!({"git_state": {"sha_at_start": "abc-dirty", "sha_at_end": "def"}})
    );
}

#[test]
fn scalars_replace() {
    let mut target = json!({"status": "pending", "count": 1});
    deep_merge(&mut target, &json!({"status": "running"}));
    assert_eq!(target, json!({"status": "running", "count": 1}));
}

#[test]
fn arrays_replace_wholesale() {
    let mut target = json!({"tasks": ["a", "b"]});
    deep_merge(&mut target, &json!({"tasks": ["a", "b", "c"]}));
    assert_eq!(target, json!({"tasks": ["a", "b", "c"]}));
}

#[test]
fn null_overwrites() {
    let mut target = json!({"report": "done"});
    deep_merge(&mut target, &json!({"report": null}));
    assert_eq!(target, json!({"report": null}));
}

#[test]
fn new_keys_are_inserted() {
    let mut target = json!({});
    deep_merge(&mut target, &json!({"a": {"b": 1}}));
    assert_eq!(target, json!({"a": {"b": 1}}));
}
