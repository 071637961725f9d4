// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `prompt` action: drive a tool adapter and finalize the task.

use agor_adapters::tool::{NormalizeCtx, PromptCtx, ToolRegistry};
use agor_core::{AgorError, ErrorKind, TaskStatus};
use agor_engine::git::capture_sha;
use agor_engine::spawn::STOP_LINE;
use agor_engine::UsageContext;
use agor_wire::{DaemonClient, PromptParams};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tracing::{info, warn};

pub async fn run(
    client: Arc<DaemonClient>,
    stdin: BufReader<Stdin>,
    params: PromptParams,
) -> Result<Option<Value>, AgorError> {
    let registry = ToolRegistry::with_defaults();
    let adapter = registry.get(params.tool)?;

    // Per-user API key, decrypted daemon-side for this task only.
    let api_key = client
        .call("config", "resolve-api-key", None, json!({"tool": params.tool}))
        .await
        .ok()
        .and_then(|v| v.get("api_key").and_then(Value::as_str).map(str::to_string));

    let (callbacks, forwarder) =
        crate::streaming::spawn_forwarder(client.clone(), params.session_id.clone(), params.task_id.clone());

    // Cooperative stop rides the kept-open stdin: the daemon writes a
    // stop line when the user aborts.
    let stop_adapter = adapter.clone();
    let stop_session = params.session_id.clone();
    let stop_task_id = params.task_id.clone();
    let stop_watcher = tokio::spawn(async move {
        let mut lines = stdin.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim() == STOP_LINE {
                info!("cooperative stop requested");
                let outcome = stop_adapter.stop_task(&stop_session, &stop_task_id).await;
                if !outcome.success {
                    warn!(reason = ?outcome.reason, "cooperative stop not effective");
                }
            }
        }
    });

    let ctx = PromptCtx {
        session_id: params.session_id.clone(),
        task_id: params.task_id.clone(),
        prompt: params.prompt.clone(),
        cwd: params.cwd.clone(),
        permission_mode: params.permission_mode,
        model: params.model.clone(),
        allowed_tools: params.allowed_tools.clone(),
        api_key,
    };
    let outcome = adapter.execute_prompt(&ctx, &callbacks).await;
    stop_watcher.abort();

    // Drain barrier: every streamed chunk lands before the final patch.
    drop(callbacks);
    let _ = forwarder.await;

    let sha_at_end = capture_sha(&params.cwd).await;

    match outcome {
        Ok(outcome) => {
            let usage_ctx: UsageContext = client
                .call(
                    "sessions",
                    "usage-context",
                    Some(params.session_id.as_str()),
                    json!({"current_task": params.task_id}),
                )
                .await
                .ok()
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default();

            let normalized = outcome
                .raw_sdk_response
                .as_ref()
                .map(|raw| {
                    adapter.normalize(
                        raw,
                        &NormalizeCtx { previous_raw: usage_ctx.previous_raw.clone() },
                    )
                });
            let computed = adapter
                .compute_context_window(outcome.raw_sdk_response.as_ref(), &usage_ctx.history);

            let status =
                if outcome.was_stopped { TaskStatus::Stopped } else { TaskStatus::Completed };
            let mut patch = json!({
                "status": status,
                "git_state": {"sha_at_end": sha_at_end},
            });
            if let Some(raw) = &outcome.raw_sdk_response {
                patch["raw_sdk_response"] = raw.clone();
            }
            if let Some(normalized) = &normalized {
                patch["normalized_sdk_response"] = serde_json::to_value(normalized)
                    .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))?;
            }
            if let Some(computed) = computed {
                patch["computed_context_window"] = json!(computed);
            }
            client.patch("tasks", params.task_id.as_str(), patch).await.map_err(|e| {
                AgorError::new(ErrorKind::NetworkError, format!("task finalize failed: {e}"))
            })?;

            Ok(Some(json!({
                "assistant_message_ids": outcome.assistant_message_ids,
                "was_stopped": outcome.was_stopped,
                "total_tokens": normalized.map(|n| n.total_tokens()),
            })))
        }
        Err(failure) => {
            let error: AgorError = failure.into();
            let patch = json!({
                "status": TaskStatus::Failed,
                "error": error,
                "git_state": {"sha_at_end": sha_at_end},
            });
            if let Err(e) = client.patch("tasks", params.task_id.as_str(), patch).await {
                warn!(error = %e, "failure finalize did not reach the daemon");
            }
            Err(error)
        }
    }
}
