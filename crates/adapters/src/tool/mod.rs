// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool adapters: the uniform contract over each agent SDK.
//!
//! An adapter drives one agent CLI/SDK as a subprocess, forwards its
//! streaming output through [`StreamCallbacks`], and normalizes its
//! token reporting into the shared [`NormalizedUsage`] shape. Callbacks
//! are delivered serially per `message_id`: start, chunks in emitted
//! order, then exactly one of end or error.

pub mod claude;
pub mod codex;
pub mod gemini;
pub mod opencode;
pub(crate) mod stream;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeScript, FakeToolAdapter, RecordingCallbacks};

use agor_core::{
    AgenticTool, AgorError, ErrorKind, MessageId, NormalizedUsage, PermissionMode, SessionId,
    StreamMeta, TaskId, TokenUsage,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Everything an adapter needs to run one prompt.
#[derive(Debug, Clone)]
pub struct PromptCtx {
    pub session_id: SessionId,
    pub task_id: TaskId,
    pub prompt: String,
    pub cwd: PathBuf,
    pub permission_mode: PermissionMode,
    pub model: Option<String>,
    /// Tools pre-approved at session scope.
    pub allowed_tools: Vec<String>,
    /// Decrypted API key, resolved from the daemon just before spawn.
    pub api_key: Option<String>,
}

/// What the adapter produced for one turn.
#[derive(Debug, Clone, Default)]
pub struct PromptOutcome {
    pub user_message_id: Option<MessageId>,
    pub assistant_message_ids: Vec<MessageId>,
    pub token_usage: Option<TokenUsage>,
    pub was_stopped: bool,
    pub raw_sdk_response: Option<Value>,
}

/// Adapter failure; `transient` hints that a retry at a higher layer
/// could succeed (the engine itself never retries).
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct ToolFailure {
    pub transient: bool,
    pub reason: String,
}

impl ToolFailure {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self { transient: true, reason: reason.into() }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self { transient: false, reason: reason.into() }
    }
}

impl From<ToolFailure> for AgorError {
    fn from(failure: ToolFailure) -> Self {
        let kind = if failure.transient {
            ErrorKind::ToolFailureTransient
        } else {
            ErrorKind::ToolFailurePermanent
        };
        AgorError::new(kind, failure.reason)
    }
}

/// Result of a cooperative stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    pub success: bool,
    pub reason: Option<String>,
}

impl StopOutcome {
    pub fn stopped() -> Self {
        Self { success: true, reason: None }
    }

    pub fn unsupported() -> Self {
        Self { success: false, reason: Some("cooperative stop not supported".into()) }
    }

    pub fn not_running() -> Self {
        Self { success: false, reason: Some("task not running in this adapter".into()) }
    }
}

/// Context handed to `normalize` — cumulative-usage tools need the
/// previous terminal task of the same session to compute a delta.
#[derive(Debug, Clone, Default)]
pub struct NormalizeCtx {
    /// Raw SDK response of the most recent terminal task, if any.
    pub previous_raw: Option<Value>,
}

/// Streaming callbacks, invoked from the executor process.
///
/// Implementations must be cheap and non-blocking; the executor forwards
/// them over an mpsc to its daemon connection.
pub trait StreamCallbacks: Send + Sync {
    fn on_stream_start(&self, message_id: &MessageId, meta: StreamMeta);
    fn on_stream_chunk(&self, message_id: &MessageId, text: &str);
    fn on_stream_end(&self, message_id: &MessageId);
    fn on_stream_error(&self, message_id: &MessageId, error: &str);
    fn on_thinking_start(&self, message_id: &MessageId);
    fn on_thinking_chunk(&self, message_id: &MessageId, text: &str);
    fn on_thinking_end(&self, message_id: &MessageId);
    /// A tool_use block finished parsing on the assistant message.
    fn on_tool_use(&self, message_id: &MessageId, id: &str, name: &str, input: &Value);
    /// The matching tool_result arrived.
    fn on_tool_result(&self, message_id: &MessageId, tool_use_id: &str, content: &Value, is_error: bool);
    /// The SDK is waiting on a permission decision.
    fn on_permission_request(&self, tool_name: &str, input: &Value);
}

/// The uniform contract each agent SDK facade satisfies.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn tool(&self) -> AgenticTool;

    /// Run one prompt to completion, streaming along the way.
    async fn execute_prompt(
        &self,
        ctx: &PromptCtx,
        callbacks: &dyn StreamCallbacks,
    ) -> Result<PromptOutcome, ToolFailure>;

    /// Cooperative interrupt. Idempotent; stopping a task that is not
    /// running reports `not_running` without error.
    async fn stop_task(&self, session_id: &SessionId, task_id: &TaskId) -> StopOutcome {
        let _ = (session_id, task_id);
        StopOutcome::unsupported()
    }

    /// Cumulative context-window estimate for UI display. `history` is
    /// the raw responses of this session's terminal tasks, oldest first,
    /// with `current` the just-finished response.
    fn compute_context_window(&self, current: Option<&Value>, history: &[Value]) -> Option<u64> {
        let _ = (current, history);
        None
    }

    /// Normalize the SDK's raw response into the shared usage shape.
    fn normalize(&self, raw: &Value, ctx: &NormalizeCtx) -> NormalizedUsage;
}

/// Reject permission modes outside the tool's declared subset.
pub(crate) fn ensure_mode_supported(
    tool: AgenticTool,
    mode: PermissionMode,
) -> Result<(), ToolFailure> {
    if tool.supports_mode(mode) {
        Ok(())
    } else {
        Err(ToolFailure::permanent(format!("{tool} does not accept permission mode {mode}")))
    }
}

/// Registry of adapters by tool.
#[derive(Default)]
pub struct ToolRegistry {
    adapters: HashMap<AgenticTool, Arc<dyn ToolAdapter>>,
}

impl ToolRegistry {
    /// All four production adapters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(claude::ClaudeCodeAdapter::new()));
        registry.register(Arc::new(codex::CodexAdapter::new()));
        registry.register(Arc::new(gemini::GeminiAdapter::new()));
        registry.register(Arc::new(opencode::OpencodeAdapter::new()));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn ToolAdapter>) {
        self.adapters.insert(adapter.tool(), adapter);
    }

    pub fn get(&self, tool: AgenticTool) -> Result<Arc<dyn ToolAdapter>, AgorError> {
        self.adapters.get(&tool).cloned().ok_or_else(|| {
            AgorError::new(ErrorKind::ValidationFailed, format!("no adapter registered for {tool}"))
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
