// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The users service: admin-managed accounts with encrypted API keys.

use super::{CallCtx, Service};
use crate::auth::{hash_password, validate_email};
use crate::hooks::{require_authenticated, HookSet};
use crate::state::AppState;
use agor_core::{
    derive_unix_username, AgenticTool, AgorError, Clock, ErrorKind, Role, User, UserId, Worktree,
    WorktreeOwner,
};
use agor_engine::UserSyncView;
use agor_wire::FindQuery;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct UsersService<C: Clock + 'static> {
    state: Arc<AppState<C>>,
}

impl<C: Clock + 'static> UsersService<C> {
    pub fn new(state: Arc<AppState<C>>) -> Arc<Self> {
        Arc::new(Self { state })
    }

    fn redact(user: User) -> Result<Value, AgorError> {
        serde_json::to_value(user.redacted())
            .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
    }

    /// Mutations are admin-only, except a user patching their own record
    /// (password change, defaults — never their role).
    fn write_guard(ctx: &CallCtx, id: Option<&str>, data: &Value) -> Result<(), AgorError> {
        if ctx.principal.is_internal() {
            return Ok(());
        }
        let Some(user) = ctx.principal.user() else {
            return Err(AgorError::new(ErrorKind::NotAuthenticated, "authentication required"));
        };
        if user.role.is_admin() {
            return Ok(());
        }
        let self_patch = id.is_some_and(|id| user.user_id.as_str().starts_with(id) || id == user.user_id.as_str());
        if self_patch && data.get("role").is_none() {
            Ok(())
        } else {
            Err(AgorError::forbidden("only admins may manage other users"))
        }
    }
}

#[async_trait]
impl<C: Clock + 'static> Service<C> for UsersService<C> {
    fn name(&self) -> &'static str {
        "users"
    }

    fn hooks(&self) -> HookSet {
        HookSet::new().before(require_authenticated())
    }

    async fn find(&self, _ctx: &CallCtx, query: FindQuery) -> Result<Vec<Value>, AgorError> {
        let rows: Vec<Value> = self
            .state
            .store
            .all::<User>()
            .into_iter()
            .filter_map(|u| serde_json::to_value(u.redacted()).ok())
            .collect();
        Ok(query.apply(rows))
    }

    async fn get(&self, _ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        Self::redact(self.state.store.get::<User>(id)?)
    }

    async fn create(&self, ctx: &CallCtx, data: Value) -> Result<Value, AgorError> {
        Self::write_guard(ctx, None, &data)?;
        let email = data
            .get("email")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("email is required"))?
            .to_string();
        validate_email(&email)?;
        let password = data
            .get("password")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("password is required"))?;
        let role = match data.get("role") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|_| AgorError::validation(format!("invalid role {value}")))?,
            None => Role::Member,
        };
        let unix_username = match data.get("unix_username").and_then(Value::as_str) {
            Some(name) => Some(name.to_string()),
            None => Some(derive_unix_username(&email)),
        };

        let now = self.state.store.clock().utc_now();
        let user = User {
            user_id: UserId::new(),
            email,
            password_hash: hash_password(password)?,
            role,
            unix_username,
            must_change_password: data
                .get("must_change_password")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            default_agentic_config: Default::default(),
            api_keys: Default::default(),
            created_at: now,
            updated_at: now,
        };
        Self::redact(self.state.store.create(user)?)
    }

    async fn patch(&self, ctx: &CallCtx, id: &str, data: Value) -> Result<Value, AgorError> {
        Self::write_guard(ctx, Some(id), &data)?;
        let mut patch = data;
        if let Some(obj) = patch.as_object_mut() {
            // Plaintext never lands in the store.
            if let Some(password) = obj.remove("password").as_ref().and_then(Value::as_str) {
                obj.insert("password_hash".into(), json!(hash_password(password)?));
                obj.insert("must_change_password".into(), json!(false));
            }
            obj.remove("api_keys");
        }
        Self::redact(self.state.store.patch::<User>(id, patch)?)
    }

    async fn remove(&self, ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        Self::write_guard(ctx, None, &Value::Null)?;
        Self::redact(self.state.store.remove::<User>(id)?)
    }

    async fn call(
        &self,
        ctx: &CallCtx,
        route: &str,
        id: Option<&str>,
        params: Value,
    ) -> Result<Value, AgorError> {
        match route {
            // Store an API key, encrypted with the daemon secret.
            "set-api-key" => {
                let target = match id {
                    Some(id) => self.state.store.resolve_id::<User>(id)?,
                    None => ctx
                        .principal
                        .user()
                        .map(|u| u.user_id.to_string())
                        .ok_or_else(|| {
                            AgorError::new(ErrorKind::NotAuthenticated, "authentication required")
                        })?,
                };
                Self::write_guard(ctx, Some(&target), &Value::Null)?;
                let tool: AgenticTool =
                    serde_json::from_value(params.get("tool").cloned().unwrap_or(Value::Null))
                        .map_err(|_| AgorError::validation("tool is required"))?;
                let api_key = params
                    .get("api_key")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AgorError::validation("api_key is required"))?;
                let encrypted = self.state.auth.vault().encrypt(api_key)?;
                let user = self.state.store.update::<User>(&target, |u| {
                    u.api_keys.insert(tool, encrypted.clone());
                })?;
                Self::redact(user)
            }
            // Everything the executor needs for unix.sync-user.
            "sync-view" => {
                let user: User = self.state.store.get(id.ok_or_else(|| {
                    AgorError::validation("sync-view requires a user id")
                })?)?;
                let username = user
                    .unix_username
                    .clone()
                    .unwrap_or_else(|| derive_unix_username(&user.email));
                let home = std::path::PathBuf::from("/home").join(&username);
                let owned: Vec<(String, std::path::PathBuf)> = self
                    .state
                    .store
                    .all::<WorktreeOwner>()
                    .into_iter()
                    .filter(|o| o.user_id == user.user_id)
                    .filter_map(|o| self.state.store.maybe_get::<Worktree>(o.worktree_id.as_str()))
                    .map(|w| (w.name.clone(), w.path.clone()))
                    .collect();
                let view = UserSyncView {
                    username,
                    shell: "/bin/bash".into(),
                    home,
                    owned_worktrees: owned,
                };
                Ok(json!({
                    "runner": self.state.config.rbac.runner_kind(),
                    "view": view,
                }))
            }
            // Dispatch the privileged sync for a user (admin flow).
            "sync-unix" => {
                Self::write_guard(ctx, None, &Value::Null)?;
                let user: User = self.state.store.get(id.ok_or_else(|| {
                    AgorError::validation("sync-unix requires a user id")
                })?)?;
                let payload = agor_wire::ExecutorPayload::new(
                    agor_wire::ExecutorAction::SyncUser(agor_wire::SyncUserParams {
                        user_id: user.user_id.clone(),
                        password: params
                            .get("password")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        delete: params.get("delete").and_then(Value::as_bool).unwrap_or(false),
                        delete_home: params
                            .get("delete_home")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                    }),
                    self.state.auth.executor_token(user.user_id.as_str(), "unix-sync"),
                );
                self.state.dispatch_executor(payload).await?;
                Ok(json!({"dispatched": true}))
            }
            other => Err(AgorError::not_found(format!("users route {other:?}"))),
        }
    }

    fn channels_for(&self, record: &Value) -> Vec<String> {
        let mut channels = vec![agor_core::channel::service("users")];
        if let Some(id) = record.get("user_id").and_then(Value::as_str) {
            channels.push(format!("user:{id}"));
        }
        channels
    }
}
