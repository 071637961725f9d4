// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! opencode adapter: drives `opencode run` with JSON event output.

use super::stream::{run_jsonl, TaskHandles};
use super::{
    ensure_mode_supported, NormalizeCtx, PromptCtx, PromptOutcome, StopOutcome, StreamCallbacks,
    ToolAdapter, ToolFailure,
};
use agor_core::{
    AgenticTool, MessageId, NormalizedUsage, PermissionMode, SessionId, StreamMeta, TaskId,
    TokenUsage,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::process::Command;

const CONTEXT_WINDOW: u64 = 200_000;

pub struct OpencodeAdapter {
    binary: String,
    handles: Arc<TaskHandles>,
}

impl OpencodeAdapter {
    pub fn new() -> Self {
        Self { binary: "opencode".into(), handles: Arc::new(TaskHandles::default()) }
    }
}

impl Default for OpencodeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn tokens_usage(raw: &Value) -> TokenUsage {
    let tokens = raw.get("tokens").cloned().unwrap_or(Value::Null);
    TokenUsage {
        input: tokens.get("input").and_then(Value::as_u64).unwrap_or(0),
        output: tokens.get("output").and_then(Value::as_u64).unwrap_or(0),
        cache_read: tokens.pointer("/cache/read").and_then(Value::as_u64).unwrap_or(0),
        cache_creation: tokens.pointer("/cache/write").and_then(Value::as_u64).unwrap_or(0),
    }
}

struct Fold<'a> {
    callbacks: &'a dyn StreamCallbacks,
    current: Option<MessageId>,
    assistant_ids: Vec<MessageId>,
    /// Running text length already emitted for the open part (the CLI
    /// re-sends the full part text on every update).
    emitted: usize,
    result: Option<Value>,
}

impl<'a> Fold<'a> {
    fn new(callbacks: &'a dyn StreamCallbacks) -> Self {
        Self { callbacks, current: None, assistant_ids: Vec::new(), emitted: 0, result: None }
    }

    fn ensure_message(&mut self) -> MessageId {
        if let Some(id) = &self.current {
            return id.clone();
        }
        let id = MessageId::new();
        self.callbacks.on_stream_start(
            &id,
            StreamMeta { role: Some("assistant".into()), model: None, parent_tool_use_id: None },
        );
        self.assistant_ids.push(id.clone());
        self.current = Some(id.clone());
        id
    }

    fn on_event(&mut self, value: Value) {
        match value.get("type").and_then(Value::as_str) {
            Some("message.part.updated") => {
                let part = &value["part"];
                match part.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        let id = self.ensure_message();
                        let text = part.get("text").and_then(Value::as_str).unwrap_or("");
                        if text.len() > self.emitted {
                            // Updates re-send the whole part; emit the new tail.
                            if let Some(tail) = text.get(self.emitted..) {
                                self.callbacks.on_stream_chunk(&id, tail);
                            }
                            self.emitted = text.len();
                        }
                    }
                    Some("tool") => {
                        let id = self.ensure_message();
                        let call_id = part.get("callID").and_then(Value::as_str).unwrap_or("");
                        let name = part.get("tool").and_then(Value::as_str).unwrap_or("");
                        match part.pointer("/state/status").and_then(Value::as_str) {
                            Some("running") => {
                                let input =
                                    part.pointer("/state/input").cloned().unwrap_or(Value::Null);
                                self.callbacks.on_tool_use(&id, call_id, name, &input);
                            }
                            Some("completed") | Some("error") => {
                                let is_error = part.pointer("/state/status")
                                    == Some(&Value::String("error".into()));
                                let content = part
                                    .pointer("/state/output")
                                    .cloned()
                                    .unwrap_or(Value::Null);
                                self.callbacks.on_tool_result(&id, call_id, &content, is_error);
                            }
                            _ => {}
                        }
                    }
                    _ => {}
                }
            }
            Some("permission.updated") => {
                let name = value.pointer("/permission/type").and_then(Value::as_str).unwrap_or("");
                let input = value.pointer("/permission/metadata").cloned().unwrap_or(Value::Null);
                self.callbacks.on_permission_request(name, &input);
            }
            Some("step.finished") => {
                self.result = Some(value);
            }
            Some("session.idle") => {
                if let Some(id) = self.current.take() {
                    self.callbacks.on_stream_end(&id);
                }
                self.emitted = 0;
            }
            _ => {}
        }
    }

    fn finish(&mut self) {
        if let Some(id) = self.current.take() {
            self.callbacks.on_stream_end(&id);
        }
    }
}

#[async_trait]
impl ToolAdapter for OpencodeAdapter {
    fn tool(&self) -> AgenticTool {
        AgenticTool::Opencode
    }

    async fn execute_prompt(
        &self,
        ctx: &PromptCtx,
        callbacks: &dyn StreamCallbacks,
    ) -> Result<PromptOutcome, ToolFailure> {
        ensure_mode_supported(self.tool(), ctx.permission_mode)?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("run").arg("--format").arg("json");
        if ctx.permission_mode == PermissionMode::AcceptEdits {
            cmd.arg("--auto-approve").arg("edits");
        }
        if let Some(model) = &ctx.model {
            cmd.arg("--model").arg(model);
        }
        cmd.arg(&ctx.prompt);
        cmd.current_dir(&ctx.cwd);
        if let Some(key) = &ctx.api_key {
            cmd.env("OPENCODE_API_KEY", key);
        }

        let cancel = self.handles.register(&ctx.session_id, &ctx.task_id);
        let mut fold = Fold::new(callbacks);
        let run = run_jsonl(cmd, None, cancel, |value| fold.on_event(value)).await;
        self.handles.remove(&ctx.session_id, &ctx.task_id);
        let outcome = run?;
        fold.finish();

        if !outcome.success() && !outcome.cancelled {
            return Err(ToolFailure::transient(format!(
                "opencode exited with {}: {}",
                outcome.exit_code,
                outcome.stderr.trim()
            )));
        }

        Ok(PromptOutcome {
            user_message_id: None,
            assistant_message_ids: fold.assistant_ids,
            token_usage: fold.result.as_ref().map(tokens_usage),
            was_stopped: outcome.cancelled,
            raw_sdk_response: fold.result,
        })
    }

    async fn stop_task(&self, session_id: &SessionId, task_id: &TaskId) -> StopOutcome {
        if self.handles.cancel(session_id, task_id) {
            StopOutcome::stopped()
        } else {
            StopOutcome::not_running()
        }
    }

    fn normalize(&self, raw: &Value, _ctx: &NormalizeCtx) -> NormalizedUsage {
        NormalizedUsage {
            token_usage: tokens_usage(raw),
            primary_model: raw.get("modelID").and_then(Value::as_str).map(str::to_string),
            context_window_limit: Some(CONTEXT_WINDOW),
            cost_usd: raw.get("cost").and_then(Value::as_f64),
            duration_ms: None,
        }
    }
}

#[cfg(test)]
#[path = "opencode_tests.rs"]
mod tests;
