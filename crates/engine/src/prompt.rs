// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The prompt pipeline and task finalization.
//!
//! Ordering contract: the task row, git snapshot, and user message are
//! durable before the executor spawns. A crash in that window leaves a
//! `pending` task that the startup sweep fails with
//! `executor-never-started`.

use crate::spawn::SpawnRequest;
use crate::Engine;
use agor_core::{
    AgorError, Clock, ContentBlock, ErrorKind, Event, GitState, Message, MessageRange,
    MessageRole, PermissionMode, Session, SessionStatus, Task, TaskId, TaskStatus, Worktree,
};
use agor_wire::{ExecutorAction, ExecutorPayload, PromptParams};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

impl<C: Clock + 'static> Engine<C> {
    /// Run the prompt pipeline for a session. Returns the created task
    /// (already `running` when the executor spawned cleanly).
    pub async fn prompt(
        self: &Arc<Self>,
        session_ref: &str,
        prompt: &str,
        permission_mode: Option<PermissionMode>,
    ) -> Result<Task, AgorError> {
        if prompt.trim().is_empty() {
            return Err(AgorError::validation("prompt must not be empty"));
        }
        let session_key = self.store.resolve_id::<Session>(session_ref)?;
        let session_id = agor_core::SessionId::from_string(session_key.clone());

        // Step 1 — the gate. Read-check-insert under the per-session
        // critical section; everything after runs outside it.
        let task = {
            let _gate = self.gates().lock(&session_id).await;
            let session: Session = self.store.get(&session_key)?;
            if session.archived {
                return Err(AgorError::validation("session is archived; unarchive it first"));
            }
            if self.active_task(&session).is_some() {
                return Err(AgorError::session_busy(&session_id));
            }

            let mode = permission_mode.unwrap_or(session.permission_config.mode);
            if !session.agentic_tool.supports_mode(mode) {
                return Err(AgorError::validation(format!(
                    "permission mode {mode} is not valid for {}",
                    session.agentic_tool
                )));
            }

            let now = self.store.clock().utc_now();
            let task = Task {
                task_id: TaskId::new(),
                session_id: session_id.clone(),
                status: TaskStatus::Pending,
                description: Task::describe(prompt),
                full_prompt: prompt.to_string(),
                message_range: MessageRange { start_index: session.message_count, end_index: None },
                tool_use_count: 0,
                report: None,
                git_state: GitState::default(),
                raw_sdk_response: None,
                normalized_sdk_response: None,
                computed_context_window: None,
                error: None,
                completed_at: None,
                created_at: now,
                updated_at: now,
            };
            let task = self.store.create(task)?;
            self.store.update::<Session>(&session_key, |s| {
                s.tasks.push(task.task_id.clone());
            })?;
            self.events.publish(Event::TaskStatusChanged {
                session_id: session_id.clone(),
                task_id: task.task_id.clone(),
                status: TaskStatus::Pending,
            });
            task
        };

        // Re-read after the gate released; the snapshot and spawn work
        // from consistent copies.
        let session: Session = self.store.get(&session_key)?;
        let worktree: Worktree = self.store.get(session.worktree_id.as_str())?;

        // Step 2 — git snapshot.
        let sha = crate::git::capture_sha(&worktree.path).await;
        let task: Task = self
            .store
            .patch(task.task_id.as_str(), json!({"git_state": {"sha_at_start": sha}}))?;

        // Step 3 — the user message, durable before spawn.
        let now = self.store.clock().utc_now();
        let message = Message {
            message_id: agor_core::MessageId::new(),
            session_id: session_id.clone(),
            task_id: task.task_id.clone(),
            role: MessageRole::User,
            content: vec![ContentBlock::text(prompt)],
            timestamp: now,
            parent_tool_use_id: None,
        };
        let message = self.store.create(message)?;
        self.store.update::<Session>(&session_key, |s| {
            s.message_count += 1;
        })?;
        self.events.publish(Event::ServiceCreated {
            service: "messages".into(),
            data: serde_json::to_value(&message).unwrap_or_default(),
        });

        // Step 4 — spawn the executor under the resolved Unix identity.
        let mode = permission_mode.unwrap_or(session.permission_config.mode);
        let token = self
            .tokens
            .mint_executor_token(session.created_by.as_str(), task.task_id.as_str());
        let mut payload = ExecutorPayload::new(
            ExecutorAction::Prompt(PromptParams {
                session_id: session_id.clone(),
                task_id: task.task_id.clone(),
                tool: session.agentic_tool,
                prompt: prompt.to_string(),
                cwd: worktree.path.clone(),
                permission_mode: mode,
                model: session.model_config.model.clone(),
                allowed_tools: session.permission_config.allowed_tools.clone(),
            }),
            token,
        );
        payload.daemon_url = Some(self.config.daemon_url.clone());
        payload.data_home = Some(self.config.data_home.clone());

        let run_as = self
            .config
            .impersonation
            .resolve(session.unix_username.as_deref())
            .map(str::to_string);
        let request = SpawnRequest { payload, run_as, sudo_self_as: None };

        let handle = match self.spawner.spawn(request).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(task = %task.task_id, error = %e, "executor spawn failed");
                self.finalize_task(
                    &task.task_id,
                    TaskStatus::Failed,
                    Some(AgorError::new(ErrorKind::ExecutorSpawnFailed, e.message.clone())),
                    None,
                )
                .await?;
                return Err(e);
            }
        };

        let entry = self.aborts().register(&session_id, &task.task_id, handle.clone());
        let task: Task = self.store.patch(
            task.task_id.as_str(),
            json!({"status": TaskStatus::Running}),
        )?;
        self.events.publish(Event::TaskStatusChanged {
            session_id: session_id.clone(),
            task_id: task.task_id.clone(),
            status: TaskStatus::Running,
        });
        self.recompute_session(&session_key)?;

        // Watch for executor exit; repair state if it died without
        // finalizing (the happy path finalizes through the tasks service).
        let engine = self.clone();
        let watch_task = task.task_id.clone();
        let worktree_path = worktree.path.clone();
        tokio::spawn(async move {
            let exit = handle.wait().await;
            engine.aborts().remove(&watch_task);
            let current = engine.store.maybe_get::<Task>(watch_task.as_str());
            let Some(current) = current else { return };
            if current.status.is_terminal() {
                return;
            }
            let stop_requested = entry.stop_requested.load(Ordering::SeqCst);
            let sha_at_end = crate::git::capture_sha(&worktree_path).await;
            let (status, error) = if stop_requested {
                (TaskStatus::Stopped, None)
            } else {
                (
                    TaskStatus::Failed,
                    Some(
                        AgorError::new(
                            ErrorKind::ExecutorCrashed,
                            format!("executor exited with code {}", exit.code),
                        )
                        .with_details(json!({"stderr": exit.stderr})),
                    ),
                )
            };
            info!(task = %watch_task, code = exit.code, %status, "executor exited without finalizing");
            if let Err(e) =
                engine.finalize_task(&watch_task, status, error, Some(sha_at_end)).await
            {
                warn!(task = %watch_task, error = %e, "crash finalize failed");
            }
        });

        Ok(task)
    }

    /// The session's single non-terminal task, if any.
    pub fn active_task(&self, session: &Session) -> Option<Task> {
        for task_id in session.tasks.iter().rev() {
            if let Some(task) = self.store.maybe_get::<Task>(task_id.as_str()) {
                if !task.status.is_terminal() {
                    return Some(task);
                }
            }
        }
        None
    }

    /// Move a task to a terminal (or awaiting) state and ripple the
    /// session status. Emits `task:stopped:complete` after a stop since
    /// by the time the final patch lands, streaming has drained.
    pub async fn finalize_task(
        self: &Arc<Self>,
        task_id: &TaskId,
        status: TaskStatus,
        error: Option<AgorError>,
        sha_at_end: Option<String>,
    ) -> Result<Task, AgorError> {
        let mut patch = json!({"status": status});
        if let Some(error) = error {
            patch["error"] = serde_json::to_value(error).unwrap_or_default();
        }
        if let Some(sha) = sha_at_end {
            patch["git_state"] = json!({"sha_at_end": sha});
        }
        if status.is_terminal() {
            patch["completed_at"] =
                serde_json::to_value(self.store.clock().utc_now()).unwrap_or_default();
        }
        let task: Task = self.store.patch(task_id.as_str(), patch)?;
        self.handle_task_transition(&task);
        Ok(task)
    }

    /// React to a task status change (from the engine or from the tasks
    /// service applying an executor patch): events + session status.
    pub fn handle_task_transition(&self, task: &Task) {
        self.events.publish(Event::TaskStatusChanged {
            session_id: task.session_id.clone(),
            task_id: task.task_id.clone(),
            status: task.status,
        });
        if task.status == TaskStatus::Stopped {
            self.events.publish(Event::TaskStoppedComplete {
                session_id: task.session_id.clone(),
                task_id: task.task_id.clone(),
            });
        }
        if let Err(e) = self.recompute_session(task.session_id.as_str()) {
            warn!(session = %task.session_id, error = %e, "session status recompute failed");
        }
    }

    /// Derive and persist the session status per the task-state rule.
    pub fn recompute_session(&self, session_ref: &str) -> Result<(), AgorError> {
        let session: Session = self.store.get(session_ref)?;
        let tasks: Vec<Task> = session
            .tasks
            .iter()
            .filter_map(|id| self.store.maybe_get::<Task>(id.as_str()))
            .collect();

        let awaiting = tasks.iter().any(|t| t.status == TaskStatus::AwaitingPermission);
        let active = tasks
            .iter()
            .any(|t| matches!(t.status, TaskStatus::Running | TaskStatus::AwaitingPermission));
        let latest_terminal = tasks.iter().rev().find(|t| t.status.is_terminal());
        let derived =
            SessionStatus::derive(latest_terminal.map(|t| t.status), active, awaiting);

        if derived != session.status {
            self.store.update::<Session>(session.session_id.as_str(), |s| {
                s.status = derived;
            })?;
            self.events.publish(Event::SessionStatusChanged {
                session_id: session.session_id.clone(),
                status: derived,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
