// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! codex adapter: drives `codex exec --json`.
//!
//! Codex reports **cumulative** token usage per turn, so normalization
//! subtracts the previous terminal task's figures; a drop means the
//! underlying CLI session restarted and current values are used verbatim.

use super::stream::{run_jsonl, TaskHandles};
use super::{
    ensure_mode_supported, NormalizeCtx, PromptCtx, PromptOutcome, StopOutcome, StreamCallbacks,
    ToolAdapter, ToolFailure,
};
use agor_core::{
    cumulative_delta, AgenticTool, MessageId, NormalizedUsage, PermissionMode, SessionId,
    StreamMeta, TaskId, TokenUsage,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::process::Command;

const GPT5_CONTEXT_WINDOW: u64 = 272_000;
const DEFAULT_CONTEXT_WINDOW: u64 = 128_000;

pub struct CodexAdapter {
    binary: String,
    handles: Arc<TaskHandles>,
}

impl CodexAdapter {
    pub fn new() -> Self {
        Self { binary: "codex".into(), handles: Arc::new(TaskHandles::default()) }
    }
}

impl Default for CodexAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the cumulative usage block from a raw codex response.
pub(crate) fn cumulative_usage(raw: &Value) -> TokenUsage {
    let usage = raw
        .pointer("/info/total_token_usage")
        .or_else(|| raw.get("total_token_usage"))
        .cloned()
        .unwrap_or(Value::Null);
    TokenUsage {
        input: usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
        output: usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
        cache_read: usage.get("cached_input_tokens").and_then(Value::as_u64).unwrap_or(0),
        cache_creation: 0,
    }
}

struct Fold<'a> {
    callbacks: &'a dyn StreamCallbacks,
    current: Option<MessageId>,
    reasoning: bool,
    assistant_ids: Vec<MessageId>,
    last_token_count: Option<Value>,
    completed: bool,
}

impl<'a> Fold<'a> {
    fn new(callbacks: &'a dyn StreamCallbacks) -> Self {
        Self {
            callbacks,
            current: None,
            reasoning: false,
            assistant_ids: Vec::new(),
            last_token_count: None,
            completed: false,
        }
    }

    fn ensure_message(&mut self, model: Option<&str>) -> MessageId {
        if let Some(id) = &self.current {
            return id.clone();
        }
        let id = MessageId::new();
        self.callbacks.on_stream_start(
            &id,
            StreamMeta {
                role: Some("assistant".into()),
                model: model.map(str::to_string),
                parent_tool_use_id: None,
            },
        );
        self.assistant_ids.push(id.clone());
        self.current = Some(id.clone());
        id
    }

    fn close_message(&mut self) {
        if self.reasoning {
            if let Some(id) = &self.current {
                self.callbacks.on_thinking_end(id);
            }
            self.reasoning = false;
        }
        if let Some(id) = self.current.take() {
            self.callbacks.on_stream_end(&id);
        }
    }

    fn on_event(&mut self, value: Value) {
        let Some(msg) = value.get("msg") else { return };
        match msg.get("type").and_then(Value::as_str) {
            Some("agent_message_delta") => {
                let id = self.ensure_message(None);
                if let Some(delta) = msg.get("delta").and_then(Value::as_str) {
                    self.callbacks.on_stream_chunk(&id, delta);
                }
            }
            Some("agent_reasoning_delta") => {
                let id = self.ensure_message(None);
                if !self.reasoning {
                    self.callbacks.on_thinking_start(&id);
                    self.reasoning = true;
                }
                if let Some(delta) = msg.get("delta").and_then(Value::as_str) {
                    self.callbacks.on_thinking_chunk(&id, delta);
                }
            }
            Some("exec_command_begin") => {
                let id = self.ensure_message(None);
                let call_id = msg.get("call_id").and_then(Value::as_str).unwrap_or("");
                let input = serde_json::json!({"command": msg.get("command").cloned()});
                self.callbacks.on_tool_use(&id, call_id, "exec_command", &input);
            }
            Some("exec_command_end") => {
                let id = self.ensure_message(None);
                let call_id = msg.get("call_id").and_then(Value::as_str).unwrap_or("");
                let is_error =
                    msg.get("exit_code").and_then(Value::as_i64).is_some_and(|c| c != 0);
                let content = msg.get("stdout").cloned().unwrap_or(Value::Null);
                self.callbacks.on_tool_result(&id, call_id, &content, is_error);
            }
            Some("exec_approval_request") => {
                let command = msg.get("command").cloned().unwrap_or(Value::Null);
                self.callbacks.on_permission_request("exec_command", &command);
            }
            Some("token_count") => {
                self.last_token_count = Some(msg.clone());
            }
            Some("task_complete") => {
                self.completed = true;
                self.close_message();
            }
            _ => {}
        }
    }
}

#[async_trait]
impl ToolAdapter for CodexAdapter {
    fn tool(&self) -> AgenticTool {
        AgenticTool::Codex
    }

    async fn execute_prompt(
        &self,
        ctx: &PromptCtx,
        callbacks: &dyn StreamCallbacks,
    ) -> Result<PromptOutcome, ToolFailure> {
        ensure_mode_supported(self.tool(), ctx.permission_mode)?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("exec").arg("--json").arg("--skip-git-repo-check");
        match ctx.permission_mode {
            PermissionMode::ReadOnly => {
                cmd.arg("--sandbox").arg("read-only");
            }
            PermissionMode::Auto => {
                cmd.arg("--full-auto");
            }
            PermissionMode::FullAccess => {
                cmd.arg("--dangerously-bypass-approvals-and-sandbox");
            }
            _ => {}
        }
        if let Some(model) = &ctx.model {
            cmd.arg("--model").arg(model);
        }
        cmd.arg(&ctx.prompt);
        cmd.current_dir(&ctx.cwd);
        if let Some(key) = &ctx.api_key {
            cmd.env("OPENAI_API_KEY", key);
        }

        let cancel = self.handles.register(&ctx.session_id, &ctx.task_id);
        let mut fold = Fold::new(callbacks);
        let run = run_jsonl(cmd, None, cancel, |value| fold.on_event(value)).await;
        self.handles.remove(&ctx.session_id, &ctx.task_id);
        let outcome = run?;
        fold.close_message();

        if !outcome.success() && !outcome.cancelled {
            return Err(ToolFailure::transient(format!(
                "codex exited with {}: {}",
                outcome.exit_code,
                outcome.stderr.trim()
            )));
        }

        let raw = fold.last_token_count;
        Ok(PromptOutcome {
            user_message_id: None,
            assistant_message_ids: fold.assistant_ids,
            token_usage: raw.as_ref().map(cumulative_usage),
            was_stopped: outcome.cancelled,
            raw_sdk_response: raw,
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
        // Cumulative totals are the context in use for the live CLI session.
        let raw = current.or_else(|| history.last())?;
        let usage = cumulative_usage(raw);
        Some(usage.input + usage.cache_read + usage.output)
    }

    fn normalize(&self, raw: &Value, ctx: &NormalizeCtx) -> NormalizedUsage {
        let current = cumulative_usage(raw);
        let previous = ctx.previous_raw.as_ref().map(cumulative_usage);
        let model = raw
            .pointer("/info/model")
            .or_else(|| raw.get("model"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let limit = match &model {
            Some(m) if m.starts_with("gpt-5") => GPT5_CONTEXT_WINDOW,
            _ => DEFAULT_CONTEXT_WINDOW,
        };
        NormalizedUsage {
            token_usage: cumulative_delta(current, previous),
            primary_model: model,
            context_window_limit: Some(limit),
            cost_usd: None,
            duration_ms: None,
        }
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
