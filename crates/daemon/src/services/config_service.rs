// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The config service: sanitized daemon config and executor secret
//! resolution.

use super::{CallCtx, Service};
use crate::hooks::{require_authenticated, HookSet, Principal};
use crate::state::AppState;
use agor_core::{AgenticTool, AgorError, Clock, ErrorKind, Task, User};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub struct ConfigService<C: Clock + 'static> {
    state: Arc<AppState<C>>,
}

impl<C: Clock + 'static> ConfigService<C> {
    pub fn new(state: Arc<AppState<C>>) -> Arc<Self> {
        Arc::new(Self { state })
    }
}

#[async_trait]
impl<C: Clock + 'static> Service<C> for ConfigService<C> {
    fn name(&self) -> &'static str {
        "config"
    }

    fn hooks(&self) -> HookSet {
        HookSet::new().before(require_authenticated())
    }

    /// Sanitized view of the running configuration (no secrets).
    async fn get(&self, _ctx: &CallCtx, key: &str) -> Result<Value, AgorError> {
        let config = &self.state.config;
        match key {
            "daemon" => Ok(json!({
                "ssh_port_base": config.daemon.ssh_port_base,
                "app_port_base": config.daemon.app_port_base,
            })),
            "rbac" => Ok(json!({
                "enabled": config.rbac.enabled,
                "daemon_user": config.rbac.daemon_user,
                "runner": config.rbac.runner_kind(),
            })),
            "execution" => serde_json::to_value(&config.execution.impersonation)
                .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string())),
            other => Err(AgorError::not_found(format!("config key {other:?}"))),
        }
    }

    async fn call(
        &self,
        ctx: &CallCtx,
        route: &str,
        _id: Option<&str>,
        params: Value,
    ) -> Result<Value, AgorError> {
        match route {
            // Executor → daemon secret resolution. The caller gets the
            // decrypted key of the user its token impersonates, and only
            // while the task the token was minted for is still live.
            "resolve-api-key" => {
                let (user, task_id) = match &ctx.principal {
                    Principal::Executor { user, task_id } => (user.clone(), task_id.clone()),
                    _ => {
                        return Err(AgorError::forbidden(
                            "resolve-api-key is an executor-only route",
                        ))
                    }
                };
                if let Some(task_id) = &task_id {
                    let live = self
                        .state
                        .store
                        .maybe_get::<Task>(task_id)
                        .is_some_and(|t| !t.status.is_terminal());
                    if !live {
                        debug!(task = %task_id, "api-key request for inactive task");
                        return Err(AgorError::forbidden(
                            "executor token's task is no longer active",
                        ));
                    }
                }

                let tool: AgenticTool =
                    serde_json::from_value(params.get("tool").cloned().unwrap_or(Value::Null))
                        .map_err(|_| AgorError::validation("tool is required"))?;
                // Re-read the user: the principal copy is redacted-free
                // but may be stale.
                let user: User = self.state.store.get(user.user_id.as_str())?;
                match user.api_keys.get(&tool) {
                    Some(secret) => {
                        let api_key = self.state.auth.vault().decrypt(secret)?;
                        Ok(json!({"api_key": api_key}))
                    }
                    None => Ok(json!({"api_key": Value::Null})),
                }
            }
            other => Err(AgorError::not_found(format!("config route {other:?}"))),
        }
    }
}
