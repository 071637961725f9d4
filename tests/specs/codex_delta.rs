// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario 5 — cumulative-usage normalization across successive turns
//! and a CLI restart, driven through the session usage context.

use super::helpers::world;
use agor_adapters::tool::{claude::ClaudeCodeAdapter, codex::CodexAdapter, NormalizeCtx, ToolAdapter};
use agor_core::{Session, TaskStatus};
use serde_json::json;

fn cumulative(input: u64, output: u64) -> serde_json::Value {
    json!({"info": {"total_token_usage": {"input_tokens": input, "output_tokens": output}}})
}

/// Record a terminal codex task carrying the given cumulative raw usage.
fn record_turn(w: &super::helpers::World, raw: serde_json::Value) -> String {
    let mut task = agor_core::test_support::TaskBuilder::default()
        .session(w.session.session_id.clone())
        .status(TaskStatus::Completed)
        .build();
    task.raw_sdk_response = Some(raw);
    let task = w.state.store.create(task).unwrap();
    w.state
        .store
        .update::<Session>(w.session.session_id.as_str(), |s| {
            s.tasks.push(task.task_id.clone())
        })
        .unwrap();
    task.task_id.to_string()
}

#[tokio::test]
async fn codex_deltas_follow_the_cumulative_rule() {
    let w = world();
    let adapter = CodexAdapter::new();
    let session_id = w.session.session_id.to_string();

    // Turn 1: cumulative {1500, 800}, no previous → verbatim.
    let ctx = w.state.engine.usage_context(&session_id, None).unwrap();
    let turn1 = adapter.normalize(
        &cumulative(1500, 800),
        &NormalizeCtx { previous_raw: ctx.previous_raw },
    );
    assert_eq!((turn1.token_usage.input, turn1.token_usage.output), (1500, 800));
    record_turn(&w, cumulative(1500, 800));

    // Turn 2: cumulative {2000, 1000} → delta {500, 200}.
    let ctx = w.state.engine.usage_context(&session_id, None).unwrap();
    let turn2 = adapter.normalize(
        &cumulative(2000, 1000),
        &NormalizeCtx { previous_raw: ctx.previous_raw },
    );
    assert_eq!((turn2.token_usage.input, turn2.token_usage.output), (500, 200));
    record_turn(&w, cumulative(2000, 1000));

    // CLI restart: cumulative {500, 200} dropped below the previous
    // figures → taken verbatim, never a negative delta.
    let ctx = w.state.engine.usage_context(&session_id, None).unwrap();
    let turn3 = adapter.normalize(
        &cumulative(500, 200),
        &NormalizeCtx { previous_raw: ctx.previous_raw },
    );
    assert_eq!((turn3.token_usage.input, turn3.token_usage.output), (500, 200));
}

#[tokio::test]
async fn per_call_tools_pass_usage_through() {
    let w = world();
    record_turn(&w, json!({"usage": {"input_tokens": 9999, "output_tokens": 1}}));

    // claude-code reports per-call usage; the previous task's figures
    // must not be subtracted.
    let adapter = ClaudeCodeAdapter::new();
    let ctx = w
        .state
        .engine
        .usage_context(w.session.session_id.as_str(), None)
        .unwrap();
    let normalized = adapter.normalize(
        &json!({"usage": {"input_tokens": 100, "output_tokens": 40}}),
        &NormalizeCtx { previous_raw: ctx.previous_raw },
    );
    assert_eq!(normalized.token_usage.input, 100);
    assert_eq!(normalized.token_usage.output, 40);
}
