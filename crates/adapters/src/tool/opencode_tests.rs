// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::fake::RecordingCallbacks;
use super::*;
use serde_json::json;

#[test]
fn full_text_updates_become_incremental_chunks() {
    let recorder = RecordingCallbacks::new();
    let mut fold = Fold::new(&*recorder);
    fold.on_event(json!({"type": "message.part.updated", "part": {"type": "text", "text": "hel"}}));
    fold.on_event(json!({"type": "message.part.updated", "part": {"type": "text", "text": "hello"}}));
    fold.on_event(json!({"type": "session.idle"}));

    let log = recorder.log();
    assert!(log[1].ends_with("hel"));
    assert!(log[2].ends_with("lo"));
    assert!(log[3].starts_with("end "));
}

#[test]
fn shrinking_update_emits_nothing() {
    let recorder = RecordingCallbacks::new();
    let mut fold = Fold::new(&*recorder);
    fold.on_event(json!({"type": "message.part.updated", "part": {"type": "text", "text": "hello"}}));
    fold.on_event(json!({"type": "message.part.updated", "part": {"type": "text", "text": "hell"}}));

    // start + one chunk only.
    assert_eq!(recorder.log().len(), 2);
}

#[test]
fn tool_parts_map_to_callbacks() {
    let recorder = RecordingCallbacks::new();
    let mut fold = Fold::new(&*recorder);
    fold.on_event(json!({"type": "message.part.updated", "part": {
        "type": "tool", "callID": "c1", "tool": "bash",
        "state": {"status": "running", "input": {"command": "ls"}},
    }}));
    fold.on_event(json!({"type": "message.part.updated", "part": {
        "type": "tool", "callID": "c1", "tool": "bash",
        "state": {"status": "error", "output": "exit 1"},
    }}));

    let log = recorder.log();
    assert!(log.iter().any(|l| l.contains("tool-use") && l.contains("c1 bash")));
    assert!(log.iter().any(|l| l.contains("tool-result") && l.contains("err=true")));
}

#[test]
fn normalize_reads_token_block() {
    let adapter = OpencodeAdapter::new();
    let raw = json!({
        "type": "step.finished",
        "modelID": "claude-sonnet-4-5",
        "cost": 0.03,
        "tokens": {"input": 50, "output": 20, "cache": {"read": 5, "write": 2}},
    });
    let usage = adapter.normalize(&raw, &NormalizeCtx::default());
    assert_eq!(usage.token_usage.input, 50);
    assert_eq!(usage.token_usage.cache_read, 5);
    assert_eq!(usage.token_usage.cache_creation, 2);
    assert_eq!(usage.cost_usd, Some(0.03));
}
