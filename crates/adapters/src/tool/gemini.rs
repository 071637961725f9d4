// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gemini adapter: drives the `gemini` CLI in streaming JSON mode.

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

const CONTEXT_WINDOW: u64 = 1_048_576;

pub struct GeminiAdapter {
    binary: String,
    handles: Arc<TaskHandles>,
}

impl GeminiAdapter {
    pub fn new() -> Self {
        Self { binary: "gemini".into(), handles: Arc::new(TaskHandles::default()) }
    }
}

impl Default for GeminiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn stats_usage(raw: &Value) -> TokenUsage {
    let stats = raw.get("stats").cloned().unwrap_or(Value::Null);
    TokenUsage {
        input: stats.get("promptTokenCount").and_then(Value::as_u64).unwrap_or(0),
        output: stats.get("candidatesTokenCount").and_then(Value::as_u64).unwrap_or(0),
        cache_read: stats.get("cachedContentTokenCount").and_then(Value::as_u64).unwrap_or(0),
        cache_creation: 0,
    }
}

struct Fold<'a> {
    callbacks: &'a dyn StreamCallbacks,
    current: Option<MessageId>,
    assistant_ids: Vec<MessageId>,
    result: Option<Value>,
}

impl<'a> Fold<'a> {
    fn new(callbacks: &'a dyn StreamCallbacks) -> Self {
        Self { callbacks, current: None, assistant_ids: Vec::new(), result: None }
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
            Some("message") => {
                if value.get("role").and_then(Value::as_str) != Some("assistant") {
                    return;
                }
                let id = self.ensure_message();
                if let Some(delta) = value.get("delta").and_then(Value::as_str) {
                    self.callbacks.on_stream_chunk(&id, delta);
                }
            }
            Some("tool_call") => {
                let id = self.ensure_message();
                let call_id = value.get("id").and_then(Value::as_str).unwrap_or("");
                let name = value.get("name").and_then(Value::as_str).unwrap_or("");
                let args = value.get("args").cloned().unwrap_or(Value::Null);
                self.callbacks.on_tool_use(&id, call_id, name, &args);
            }
            Some("tool_result") => {
                let id = self.ensure_message();
                let call_id = value.get("id").and_then(Value::as_str).unwrap_or("");
                let content = value.get("output").cloned().unwrap_or(Value::Null);
                let is_error = value.get("error").is_some();
                self.callbacks.on_tool_result(&id, call_id, &content, is_error);
            }
            Some("confirmation_request") => {
                let name = value.get("tool").and_then(Value::as_str).unwrap_or("");
                let args = value.get("args").cloned().unwrap_or(Value::Null);
                self.callbacks.on_permission_request(name, &args);
            }
            Some("result") => {
                self.result = Some(value);
                if let Some(id) = self.current.take() {
                    self.callbacks.on_stream_end(&id);
                }
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
impl ToolAdapter for GeminiAdapter {
    fn tool(&self) -> AgenticTool {
        AgenticTool::Gemini
    }

    async fn execute_prompt(
        &self,
        ctx: &PromptCtx,
        callbacks: &dyn StreamCallbacks,
    ) -> Result<PromptOutcome, ToolFailure> {
        ensure_mode_supported(self.tool(), ctx.permission_mode)?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-p").arg(&ctx.prompt).arg("--output-format").arg("stream-json");
        match ctx.permission_mode {
            PermissionMode::AcceptEdits => {
                cmd.arg("--approval-mode").arg("auto_edit");
            }
            PermissionMode::BypassPermissions => {
                cmd.arg("--yolo");
            }
            _ => {}
        }
        if let Some(model) = &ctx.model {
            cmd.arg("--model").arg(model);
        }
        cmd.current_dir(&ctx.cwd);
        if let Some(key) = &ctx.api_key {
            cmd.env("GEMINI_API_KEY", key);
        }

        let cancel = self.handles.register(&ctx.session_id, &ctx.task_id);
        let mut fold = Fold::new(callbacks);
        let run = run_jsonl(cmd, None, cancel, |value| fold.on_event(value)).await;
        self.handles.remove(&ctx.session_id, &ctx.task_id);
        let outcome = run?;
        fold.finish();

        if !outcome.success() && !outcome.cancelled {
            return Err(ToolFailure::transient(format!(
                "gemini exited with {}: {}",
                outcome.exit_code,
                outcome.stderr.trim()
            )));
        }

        Ok(PromptOutcome {
            user_message_id: None,
            assistant_message_ids: fold.assistant_ids,
            token_usage: fold.result.as_ref().map(stats_usage),
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
            token_usage: stats_usage(raw),
            primary_model: raw.get("model").and_then(Value::as_str).map(str::to_string),
            context_window_limit: Some(CONTEXT_WINDOW),
            cost_usd: None,
            duration_ms: raw.pointer("/stats/durationMs").and_then(Value::as_u64),
        }
    }
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;
