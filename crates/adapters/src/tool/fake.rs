// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted tool adapter + recording callbacks for tests.

use super::{
    NormalizeCtx, PromptCtx, PromptOutcome, StopOutcome, StreamCallbacks, ToolAdapter, ToolFailure,
};
use agor_core::{
    cumulative_delta, AgenticTool, MessageId, NormalizedUsage, SessionId, StreamMeta, TaskId,
    TokenUsage,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One scripted turn of the fake adapter.
#[derive(Debug, Clone)]
pub enum FakeScript {
    /// Stream the given chunks, then succeed with this usage.
    Stream { chunks: Vec<String>, usage: TokenUsage, raw: Value },
    /// Stream forever (until stopped); chunks cycle with a small delay.
    Hang { chunks: Vec<String> },
    /// Fail with a tool failure.
    Fail { transient: bool, reason: String },
    /// Surface a permission request, then hang until stopped.
    AskPermission { tool_name: String },
}

/// Scripted adapter: pops one [`FakeScript`] per prompt, records calls.
pub struct FakeToolAdapter {
    tool: AgenticTool,
    scripts: Mutex<Vec<FakeScript>>,
    prompts: Mutex<Vec<String>>,
    handles: Mutex<Vec<(String, CancellationToken)>>,
}

impl FakeToolAdapter {
    pub fn new(tool: AgenticTool) -> Arc<Self> {
        Arc::new(Self {
            tool,
            scripts: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Queue the next scripted outcome (FIFO).
    pub fn push_script(&self, script: FakeScript) {
        self.scripts.lock().push(script);
    }

    /// Convenience: a one-chunk success with the given usage.
    pub fn push_success(&self, text: &str, usage: TokenUsage) {
        self.push_script(FakeScript::Stream {
            chunks: vec![text.to_string()],
            usage,
            raw: serde_json::json!({"usage": {
                "input_tokens": usage.input,
                "output_tokens": usage.output,
            }}),
        });
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    fn next_script(&self) -> FakeScript {
        let mut scripts = self.scripts.lock();
        if scripts.is_empty() {
            FakeScript::Stream {
                chunks: vec!["ok".into()],
                usage: TokenUsage { input: 10, output: 5, ..Default::default() },
                raw: serde_json::json!({"usage": {"input_tokens": 10, "output_tokens": 5}}),
            }
        } else {
            scripts.remove(0)
        }
    }
}

#[async_trait]
impl ToolAdapter for FakeToolAdapter {
    fn tool(&self) -> AgenticTool {
        self.tool
    }

    async fn execute_prompt(
        &self,
        ctx: &PromptCtx,
        callbacks: &dyn StreamCallbacks,
    ) -> Result<PromptOutcome, ToolFailure> {
        super::ensure_mode_supported(self.tool, ctx.permission_mode)?;
        self.prompts.lock().push(ctx.prompt.clone());

        let cancel = CancellationToken::new();
        let key = format!("{}:{}", ctx.session_id, ctx.task_id);
        self.handles.lock().push((key.clone(), cancel.clone()));

        let script = self.next_script();
        let message_id = MessageId::new();
        let finish = |stopped: bool, usage: Option<TokenUsage>, raw: Option<Value>| PromptOutcome {
            user_message_id: None,
            assistant_message_ids: vec![message_id.clone()],
            token_usage: usage,
            was_stopped: stopped,
            raw_sdk_response: raw,
        };

        let result = match script {
            FakeScript::Fail { transient, reason } => Err(ToolFailure { transient, reason }),
            FakeScript::Stream { chunks, usage, raw } => {
                callbacks.on_stream_start(&message_id, StreamMeta::default());
                for chunk in &chunks {
                    callbacks.on_stream_chunk(&message_id, chunk);
                }
                callbacks.on_stream_end(&message_id);
                Ok(finish(false, Some(usage), Some(raw)))
            }
            FakeScript::Hang { chunks } => {
                callbacks.on_stream_start(&message_id, StreamMeta::default());
                let mut i = 0;
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    callbacks.on_stream_chunk(&message_id, &chunks[i % chunks.len()]);
                    i += 1;
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                    }
                }
                callbacks.on_stream_end(&message_id);
                Ok(finish(true, None, None))
            }
            FakeScript::AskPermission { tool_name } => {
                callbacks.on_stream_start(&message_id, StreamMeta::default());
                callbacks.on_permission_request(&tool_name, &Value::Null);
                cancel.cancelled().await;
                callbacks.on_stream_end(&message_id);
                Ok(finish(true, None, None))
            }
        };

        self.handles.lock().retain(|(k, _)| k != &key);
        result
    }

    async fn stop_task(&self, session_id: &SessionId, task_id: &TaskId) -> StopOutcome {
        let key = format!("{session_id}:{task_id}");
        let handles = self.handles.lock();
        match handles.iter().find(|(k, _)| k == &key) {
            Some((_, token)) => {
                token.cancel();
                StopOutcome::stopped()
            }
            None => StopOutcome::not_running(),
        }
    }

    fn compute_context_window(&self, current: Option<&Value>, history: &[Value]) -> Option<u64> {
        let raw = current.or_else(|| history.last())?;
        let usage = fake_usage(raw);
        Some(usage.input + usage.output)
    }

    fn normalize(&self, raw: &Value, ctx: &NormalizeCtx) -> NormalizedUsage {
        let current = fake_usage(raw);
        let token_usage = if self.tool.reports_cumulative_usage() {
            cumulative_delta(current, ctx.previous_raw.as_ref().map(fake_usage))
        } else {
            current
        };
        NormalizedUsage {
            token_usage,
            primary_model: Some("fake-model".into()),
            context_window_limit: Some(100_000),
            cost_usd: None,
            duration_ms: None,
        }
    }
}

fn fake_usage(raw: &Value) -> TokenUsage {
    TokenUsage {
        input: raw.pointer("/usage/input_tokens").and_then(Value::as_u64).unwrap_or(0),
        output: raw.pointer("/usage/output_tokens").and_then(Value::as_u64).unwrap_or(0),
        cache_read: 0,
        cache_creation: 0,
    }
}

/// Callbacks recorder shared by adapter and engine tests.
#[derive(Default)]
pub struct RecordingCallbacks {
    pub events: Mutex<Vec<String>>,
}

impl RecordingCallbacks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn log(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn push(&self, entry: String) {
        self.events.lock().push(entry);
    }
}

impl StreamCallbacks for RecordingCallbacks {
    fn on_stream_start(&self, message_id: &MessageId, _meta: StreamMeta) {
        self.push(format!("start {message_id}"));
    }

    fn on_stream_chunk(&self, message_id: &MessageId, text: &str) {
        self.push(format!("chunk {message_id} {text}"));
    }

    fn on_stream_end(&self, message_id: &MessageId) {
        self.push(format!("end {message_id}"));
    }

    fn on_stream_error(&self, message_id: &MessageId, error: &str) {
        self.push(format!("error {message_id} {error}"));
    }

    fn on_thinking_start(&self, message_id: &MessageId) {
        self.push(format!("thinking-start {message_id}"));
    }

    fn on_thinking_chunk(&self, message_id: &MessageId, text: &str) {
        self.push(format!("thinking-chunk {message_id} {text}"));
    }

    fn on_thinking_end(&self, message_id: &MessageId) {
        self.push(format!("thinking-end {message_id}"));
    }

    fn on_tool_use(&self, message_id: &MessageId, id: &str, name: &str, _input: &Value) {
        self.push(format!("tool-use {message_id} {id} {name}"));
    }

    fn on_tool_result(&self, message_id: &MessageId, tool_use_id: &str, _content: &Value, is_error: bool) {
        self.push(format!("tool-result {message_id} {tool_use_id} err={is_error}"));
    }

    fn on_permission_request(&self, tool_name: &str, _input: &Value) {
        self.push(format!("permission {tool_name}"));
    }
}
