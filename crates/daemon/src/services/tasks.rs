// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tasks service. Executors finalize tasks here; the engine ripples
//! session status off every transition.

use super::{CallCtx, Service};
use crate::hooks::{require_authenticated, HookSet, Principal};
use crate::state::AppState;
use agor_core::{AgorError, Clock, ErrorKind, Session, Task, TaskStatus};
use agor_wire::FindQuery;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct TasksService<C: Clock + 'static> {
    state: Arc<AppState<C>>,
}

impl<C: Clock + 'static> TasksService<C> {
    pub fn new(state: Arc<AppState<C>>) -> Arc<Self> {
        Arc::new(Self { state })
    }

    /// Only the executor holding this task's token, an internal caller,
    /// an admin, or the session creator may finalize a task.
    fn patch_guard(&self, ctx: &CallCtx, task: &Task) -> Result<(), AgorError> {
        match &ctx.principal {
            Principal::Executor { task_id, .. } => {
                let matches = task_id.as_deref().is_some_and(|t| t == task.task_id.as_str());
                if matches {
                    Ok(())
                } else {
                    Err(AgorError::forbidden("executor token was minted for another task"))
                }
            }
            Principal::Internal { .. } => Ok(()),
            principal => {
                let Some(user) = principal.user() else {
                    return Err(AgorError::new(
                        ErrorKind::NotAuthenticated,
                        "authentication required",
                    ));
                };
                if user.role.is_admin() {
                    return Ok(());
                }
                let session: Session = self.state.store.get(task.session_id.as_str())?;
                if session.created_by == user.user_id {
                    Ok(())
                } else {
                    Err(AgorError::forbidden("task belongs to another user's session"))
                }
            }
        }
    }
}

#[async_trait]
impl<C: Clock + 'static> Service<C> for TasksService<C> {
    fn name(&self) -> &'static str {
        "tasks"
    }

    fn hooks(&self) -> HookSet {
        HookSet::new().before(require_authenticated())
    }

    async fn find(&self, _ctx: &CallCtx, query: FindQuery) -> Result<Vec<Value>, AgorError> {
        Ok(query.apply(self.state.store.all_raw(agor_storage::Table::Tasks)))
    }

    async fn get(&self, _ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        let task: Task = self.state.store.get(id)?;
        serde_json::to_value(task)
            .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
    }

    async fn patch(&self, ctx: &CallCtx, id: &str, data: Value) -> Result<Value, AgorError> {
        let before: Task = self.state.store.get(id)?;
        self.patch_guard(ctx, &before)?;

        let mut data = data;
        let becomes_terminal = data
            .get("status")
            .and_then(|s| serde_json::from_value::<TaskStatus>(s.clone()).ok())
            .is_some_and(|s| s.is_terminal() && !before.status.is_terminal());
        if becomes_terminal {
            if let Some(obj) = data.as_object_mut() {
                if !obj.contains_key("completed_at") {
                    obj.insert(
                        "completed_at".into(),
                        serde_json::to_value(self.state.store.clock().utc_now())
                            .unwrap_or_default(),
                    );
                }
                // Close the contiguous message range at the session's
                // current high-water mark.
                if let Some(session) =
                    self.state.store.maybe_get::<Session>(before.session_id.as_str())
                {
                    obj.insert(
                        "message_range".into(),
                        json!({"end_index": session.message_count}),
                    );
                }
            }
        }

        let after: Task = self.state.store.patch(id, data)?;
        if after.status != before.status {
            // Streaming has drained by the time the executor's final
            // patch lands, so stopped-complete fires here.
            self.state.engine.handle_task_transition(&after);
        }
        serde_json::to_value(after)
            .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
    }
}
