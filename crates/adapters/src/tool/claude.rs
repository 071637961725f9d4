// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! claude-code adapter: drives the `claude` CLI in stream-json mode.

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

const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;
const LONG_CONTEXT_WINDOW: u64 = 1_000_000;

pub struct ClaudeCodeAdapter {
    binary: String,
    handles: Arc<TaskHandles>,
}

impl ClaudeCodeAdapter {
    pub fn new() -> Self {
        Self { binary: "claude".into(), handles: Arc::new(TaskHandles::default()) }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into(), handles: Arc::new(TaskHandles::default()) }
    }

    fn mode_flag(mode: PermissionMode) -> &'static str {
        match mode {
            PermissionMode::Plan => "plan",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
            _ => "default",
        }
    }
}

impl Default for ClaudeCodeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds stream-json events into callbacks + outcome.
struct Fold<'a> {
    callbacks: &'a dyn StreamCallbacks,
    /// Currently-open assistant message and whether the open block is thinking.
    current: Option<MessageId>,
    in_thinking: bool,
    assistant_ids: Vec<MessageId>,
    result: Option<Value>,
}

impl<'a> Fold<'a> {
    fn new(callbacks: &'a dyn StreamCallbacks) -> Self {
        Self { callbacks, current: None, in_thinking: false, assistant_ids: Vec::new(), result: None }
    }

    fn on_event(&mut self, value: Value) {
        match value.get("type").and_then(Value::as_str) {
            Some("stream_event") => {
                if let Some(event) = value.get("event") {
                    self.on_stream_event(event);
                }
            }
            // Complete assistant snapshots carry tool_use blocks.
            Some("assistant") => self.on_assistant_snapshot(&value),
            // Tool results come back as synthetic user messages.
            Some("user") => self.on_tool_results(&value),
            Some("control_request") => {
                let request = &value["request"];
                if request.get("subtype").and_then(Value::as_str) == Some("can_use_tool") {
                    let name = request.get("tool_name").and_then(Value::as_str).unwrap_or("");
                    let input = request.get("input").cloned().unwrap_or(Value::Null);
                    self.callbacks.on_permission_request(name, &input);
                }
            }
            Some("result") => self.result = Some(value),
            _ => {}
        }
    }

    fn on_stream_event(&mut self, event: &Value) {
        match event.get("type").and_then(Value::as_str) {
            Some("message_start") => {
                let id = MessageId::new();
                let model = event
                    .pointer("/message/model")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                self.callbacks.on_stream_start(
                    &id,
                    StreamMeta { role: Some("assistant".into()), model, parent_tool_use_id: None },
                );
                self.assistant_ids.push(id.clone());
                self.current = Some(id);
            }
            Some("content_block_start") => {
                if event.pointer("/content_block/type").and_then(Value::as_str) == Some("thinking")
                {
                    if let Some(id) = &self.current {
                        self.callbacks.on_thinking_start(id);
                        self.in_thinking = true;
                    }
                }
            }
            Some("content_block_delta") => {
                let Some(id) = &self.current else { return };
                match event.pointer("/delta/type").and_then(Value::as_str) {
                    Some("text_delta") => {
                        if let Some(text) = event.pointer("/delta/text").and_then(Value::as_str) {
                            self.callbacks.on_stream_chunk(id, text);
                        }
                    }
                    Some("thinking_delta") => {
                        if let Some(text) = event.pointer("/delta/thinking").and_then(Value::as_str)
                        {
                            self.callbacks.on_thinking_chunk(id, text);
                        }
                    }
                    _ => {}
                }
            }
            Some("content_block_stop") => {
                if self.in_thinking {
                    if let Some(id) = &self.current {
                        self.callbacks.on_thinking_end(id);
                    }
                    self.in_thinking = false;
                }
            }
            Some("message_stop") => {
                if let Some(id) = self.current.take() {
                    self.callbacks.on_stream_end(&id);
                }
            }
            _ => {}
        }
    }

    fn on_assistant_snapshot(&mut self, value: &Value) {
        let Some(blocks) = value.pointer("/message/content").and_then(Value::as_array) else {
            return;
        };
        let target = match (&self.current, self.assistant_ids.last()) {
            (Some(id), _) | (None, Some(id)) => id.clone(),
            (None, None) => return,
        };
        for block in blocks {
            if block.get("type").and_then(Value::as_str) == Some("tool_use") {
                let id = block.get("id").and_then(Value::as_str).unwrap_or("");
                let name = block.get("name").and_then(Value::as_str).unwrap_or("");
                let input = block.get("input").cloned().unwrap_or(Value::Null);
                self.callbacks.on_tool_use(&target, id, name, &input);
            }
        }
    }

    fn on_tool_results(&mut self, value: &Value) {
        let Some(blocks) = value.pointer("/message/content").and_then(Value::as_array) else {
            return;
        };
        let Some(target) = self.assistant_ids.last().cloned() else { return };
        for block in blocks {
            if block.get("type").and_then(Value::as_str) == Some("tool_result") {
                let tool_use_id = block.get("tool_use_id").and_then(Value::as_str).unwrap_or("");
                let content = block.get("content").cloned().unwrap_or(Value::Null);
                let is_error = block.get("is_error").and_then(Value::as_bool).unwrap_or(false);
                self.callbacks.on_tool_result(&target, tool_use_id, &content, is_error);
            }
        }
    }

    /// Close any message left open by a kill mid-stream.
    fn finish(&mut self, cancelled: bool) {
        if let Some(id) = self.current.take() {
            if cancelled {
                self.callbacks.on_stream_end(&id);
            } else {
                self.callbacks.on_stream_error(&id, "stream ended without message_stop");
            }
        }
    }
}

fn usage_from(raw: &Value) -> TokenUsage {
    let usage = raw.get("usage").cloned().unwrap_or(Value::Null);
    TokenUsage {
        input: usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
        output: usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
        cache_read: usage.get("cache_read_input_tokens").and_then(Value::as_u64).unwrap_or(0),
        cache_creation: usage
            .get("cache_creation_input_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    }
}

fn primary_model(raw: &Value) -> Option<String> {
    if let Some(model) = raw.get("model").and_then(Value::as_str) {
        return Some(model.to_string());
    }
    // modelUsage is keyed by model name; the first key is the primary.
    raw.get("modelUsage")
        .and_then(Value::as_object)
        .and_then(|m| m.keys().next())
        .map(String::from)
}

#[async_trait]
impl ToolAdapter for ClaudeCodeAdapter {
    fn tool(&self) -> AgenticTool {
        AgenticTool::ClaudeCode
    }

    async fn execute_prompt(
        &self,
        ctx: &PromptCtx,
        callbacks: &dyn StreamCallbacks,
    ) -> Result<PromptOutcome, ToolFailure> {
        ensure_mode_supported(self.tool(), ctx.permission_mode)?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-p")
            .arg(&ctx.prompt)
            .arg("--output-format")
            .arg("stream-json")
            .arg("--include-partial-messages")
            .arg("--verbose")
            .arg("--permission-mode")
            .arg(Self::mode_flag(ctx.permission_mode));
        if let Some(model) = &ctx.model {
            cmd.arg("--model").arg(model);
        }
        if !ctx.allowed_tools.is_empty() {
            cmd.arg("--allowed-tools").arg(ctx.allowed_tools.join(","));
        }
        cmd.current_dir(&ctx.cwd);
        if let Some(key) = &ctx.api_key {
            cmd.env("ANTHROPIC_API_KEY", key);
        }

        let cancel = self.handles.register(&ctx.session_id, &ctx.task_id);
        let mut fold = Fold::new(callbacks);
        let run = run_jsonl(cmd, None, cancel, |value| fold.on_event(value)).await;
        self.handles.remove(&ctx.session_id, &ctx.task_id);
        let outcome = run?;
        fold.finish(outcome.cancelled);

        if !outcome.success() && !outcome.cancelled {
            return Err(ToolFailure::transient(format!(
                "claude exited with {}: {}",
                outcome.exit_code,
                outcome.stderr.trim()
            )));
        }

        let token_usage = fold.result.as_ref().map(usage_from);
        Ok(PromptOutcome {
            user_message_id: None,
            assistant_message_ids: fold.assistant_ids,
            token_usage,
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

    fn compute_context_window(&self, current: Option<&Value>, history: &[Value]) -> Option<u64> {
        // Per-call usage already reflects the whole conversation: the
        // input side of the latest turn is the context in use.
        let raw = current.or_else(|| history.last())?;
        let usage = usage_from(raw);
        Some(usage.input + usage.cache_read + usage.cache_creation + usage.output)
    }

    fn normalize(&self, raw: &Value, _ctx: &NormalizeCtx) -> NormalizedUsage {
        let model = primary_model(raw);
        let limit = match &model {
            Some(m) if m.contains("[1m]") => LONG_CONTEXT_WINDOW,
            _ => DEFAULT_CONTEXT_WINDOW,
        };
        NormalizedUsage {
            token_usage: usage_from(raw),
            primary_model: model,
            context_window_limit: Some(limit),
            cost_usd: raw.get("total_cost_usd").and_then(Value::as_f64),
            duration_ms: raw.get("duration_ms").and_then(Value::as_u64),
        }
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
