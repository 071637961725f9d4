// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The sessions service: conversation CRUD plus the prompt/stop/decision
//! routes in front of the engine.

use super::{CallCtx, Service};
use crate::hooks::{require_authenticated, HookSet};
use crate::state::AppState;
use agor_core::{
    AgenticTool, AgorError, Clock, ErrorKind, Genealogy, Message, OthersCan, PermissionConfig,
    PermissionMode, Role, Session, SessionId, Task, User, Worktree, WorktreeOwner,
};
use agor_wire::FindQuery;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub struct SessionsService<C: Clock + 'static> {
    state: Arc<AppState<C>>,
}

impl<C: Clock + 'static> SessionsService<C> {
    pub fn new(state: Arc<AppState<C>>) -> Arc<Self> {
        Arc::new(Self { state })
    }

    fn to_value(session: Session) -> Result<Value, AgorError> {
        serde_json::to_value(session)
            .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
    }

    fn is_worktree_owner(&self, worktree: &Worktree, user: &User) -> bool {
        self.state
            .store
            .maybe_get::<WorktreeOwner>(&WorktreeOwner::key(
                &worktree.worktree_id,
                &user.user_id,
            ))
            .is_some()
    }

    /// Visibility: creator, worktree owner, admin, or a worktree shared
    /// at `view`/`prompt`/`all`.
    fn can_view(&self, session: &Session, ctx: &CallCtx) -> bool {
        if ctx.principal.is_internal() {
            return true;
        }
        let Some(user) = ctx.principal.user() else { return false };
        if user.role.is_admin() || session.created_by == user.user_id {
            return true;
        }
        let Some(worktree) = self.state.store.maybe_get::<Worktree>(session.worktree_id.as_str())
        else {
            return false;
        };
        self.is_worktree_owner(&worktree, user) || worktree.others_can != OthersCan::None
    }

    /// Prompting needs more than visibility: `prompt` or `all` sharing,
    /// ownership, or admin.
    fn can_prompt(&self, session: &Session, ctx: &CallCtx) -> Result<(), AgorError> {
        if ctx.principal.is_internal() {
            return Ok(());
        }
        let Some(user) = ctx.principal.user() else {
            return Err(AgorError::new(ErrorKind::NotAuthenticated, "authentication required"));
        };
        if user.role == Role::Viewer {
            return Err(AgorError::forbidden("viewers cannot prompt sessions"));
        }
        if user.role.is_admin() || session.created_by == user.user_id {
            return Ok(());
        }
        let worktree: Worktree = self.state.store.get(session.worktree_id.as_str())?;
        if self.is_worktree_owner(&worktree, user)
            || matches!(worktree.others_can, OthersCan::Prompt | OthersCan::All)
        {
            Ok(())
        } else {
            Err(AgorError::forbidden("worktree is not shared for prompting"))
        }
    }

    fn effective_permission_config(
        &self,
        tool: AgenticTool,
        requested: Option<&Value>,
        creator: Option<&User>,
    ) -> Result<PermissionConfig, AgorError> {
        let mut config = match requested {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| AgorError::validation(format!("invalid permission_config: {e}")))?,
            None => PermissionConfig::for_tool(tool),
        };
        // User defaults fill gaps only when the request carried nothing.
        if requested.is_none() {
            if let Some(default_mode) = creator
                .and_then(|u| u.default_agentic_config.get(&tool))
                .and_then(|d| d.permission_mode)
            {
                config.mode = default_mode;
            }
        }
        if !tool.supports_mode(config.mode) {
            return Err(AgorError::validation(format!(
                "permission mode {} is not valid for {tool}",
                config.mode
            )));
        }
        Ok(config)
    }
}

#[async_trait]
impl<C: Clock + 'static> Service<C> for SessionsService<C> {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn hooks(&self) -> HookSet {
        HookSet::new().before(require_authenticated())
    }

    async fn find(&self, ctx: &CallCtx, query: FindQuery) -> Result<Vec<Value>, AgorError> {
        let rows: Vec<Value> = self
            .state
            .store
            .all::<Session>()
            .into_iter()
            .filter(|s| self.can_view(s, ctx))
            .filter_map(|s| serde_json::to_value(s).ok())
            .collect();
        Ok(query.apply(rows))
    }

    async fn get(&self, ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        let session: Session = self.state.store.get(id)?;
        if !self.can_view(&session, ctx) {
            return Err(AgorError::forbidden("session is not visible to you"));
        }
        Self::to_value(session)
    }

    async fn create(&self, ctx: &CallCtx, data: Value) -> Result<Value, AgorError> {
        let creator = match data.get("created_by").and_then(Value::as_str) {
            // Internal callers (gateway) attach the channel owner.
            Some(id) if ctx.principal.is_internal() => {
                Some(self.state.store.get::<User>(id)?)
            }
            _ => ctx.principal.user().cloned(),
        };
        let creator = creator.ok_or_else(|| {
            AgorError::new(ErrorKind::NotAuthenticated, "session creation requires a user")
        })?;

        let worktree_id = data
            .get("worktree_id")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("worktree_id is required"))?;
        let worktree: Worktree = self.state.store.get(worktree_id)?;

        let tool: AgenticTool =
            serde_json::from_value(data.get("agentic_tool").cloned().unwrap_or(Value::Null))
                .map_err(|_| AgorError::validation("agentic_tool is required"))?;
        let permission_config = self.effective_permission_config(
            tool,
            data.get("permission_config"),
            Some(&creator),
        )?;
        let model_config = match data.get("model_config") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| AgorError::validation(format!("invalid model_config: {e}")))?,
            None => {
                let mut config = agor_core::ModelConfig::default();
                config.model = creator
                    .default_agentic_config
                    .get(&tool)
                    .and_then(|d| d.model.clone());
                config
            }
        };
        let genealogy: Genealogy = match data.get("genealogy") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| AgorError::validation(format!("invalid genealogy: {e}")))?,
            None => Genealogy::default(),
        };

        let now = self.state.store.clock().utc_now();
        let session = Session {
            session_id: SessionId::new(),
            worktree_id: worktree.worktree_id.clone(),
            // I5: snapshot of the creator's unix_username at creation.
            unix_username: creator.unix_username.clone(),
            created_by: creator.user_id.clone(),
            agentic_tool: tool,
            permission_config,
            model_config,
            status: Default::default(),
            tasks: Vec::new(),
            message_count: 0,
            genealogy,
            custom_context: data.get("custom_context").cloned(),
            archived: false,
            created_at: now,
            updated_at: now,
        };
        info!(session = %session.session_id, tool = %tool, worktree = %worktree.worktree_id, "session created");
        Self::to_value(self.state.store.create(session)?)
    }

    async fn patch(&self, ctx: &CallCtx, id: &str, data: Value) -> Result<Value, AgorError> {
        let session: Session = self.state.store.get(id)?;
        self.can_prompt(&session, ctx)?;

        if let Some(mode) = data.pointer("/permission_config/mode") {
            let mode: PermissionMode = serde_json::from_value(mode.clone())
                .map_err(|_| AgorError::validation(format!("invalid permission mode {mode}")))?;
            if !session.agentic_tool.supports_mode(mode) {
                return Err(AgorError::validation(format!(
                    "permission mode {mode} is not valid for {}",
                    session.agentic_tool
                )));
            }
        }
        Self::to_value(self.state.store.patch::<Session>(id, data)?)
    }

    /// Cascading delete: tasks and messages go with the session.
    async fn remove(&self, ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        match ctx.principal.role() {
            Some(role) if role.is_admin() => {}
            _ => return Err(AgorError::forbidden("only admins may delete sessions")),
        }
        let session: Session = self.state.store.remove(id)?;
        for task_id in &session.tasks {
            let _ = self.state.store.remove::<Task>(task_id.as_str());
        }
        for message in self.state.store.all::<Message>() {
            if message.session_id == session.session_id {
                let _ = self.state.store.remove::<Message>(message.message_id.as_str());
            }
        }
        self.state.engine.gates().forget(&session.session_id);
        Self::to_value(session)
    }

    async fn call(
        &self,
        ctx: &CallCtx,
        route: &str,
        id: Option<&str>,
        params: Value,
    ) -> Result<Value, AgorError> {
        // Gateway-internal session creation (no id).
        if route == "create-internal" {
            if !ctx.principal.is_internal() {
                return Err(AgorError::forbidden("create-internal is an internal route"));
            }
            return self.create(ctx, params).await;
        }
        let id = id.ok_or_else(|| AgorError::validation(format!("{route} requires a session id")))?;
        match route {
            "prompt" => {
                let session: Session = self.state.store.get(id)?;
                self.can_prompt(&session, ctx)?;
                let prompt = params
                    .get("prompt")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AgorError::validation("prompt is required"))?;
                let mode = match params.get("permission_mode").or_else(|| params.get("permissionMode")) {
                    Some(value) => Some(
                        serde_json::from_value::<PermissionMode>(value.clone()).map_err(|_| {
                            AgorError::validation(format!("invalid permission mode {value}"))
                        })?,
                    ),
                    None => None,
                };
                let task = self.state.engine.prompt(id, prompt, mode).await?;
                serde_json::to_value(task)
                    .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
            }
            "stop" => {
                let session: Session = self.state.store.get(id)?;
                self.can_prompt(&session, ctx)?;
                let task_ref = params.get("task_id").and_then(Value::as_str);
                let result = self.state.engine.stop_task(id, task_ref).await?;
                Ok(match result {
                    agor_engine::StopResult::Stopping { task_id } => {
                        json!({"stopping": true, "task_id": task_id})
                    }
                    agor_engine::StopResult::AlreadyTerminal { task_id, status } => {
                        json!({"stopping": false, "task_id": task_id, "status": status})
                    }
                    agor_engine::StopResult::NoActiveTask => json!({"stopping": false}),
                })
            }
            "decision" => self.decide(ctx, id, params).await,
            "usage-context" => {
                let current = params.get("current_task").and_then(Value::as_str);
                let context = self.state.engine.usage_context(id, current)?;
                serde_json::to_value(context)
                    .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
            }
            other => Err(AgorError::not_found(format!("sessions route {other:?}"))),
        }
    }
}

impl<C: Clock + 'static> SessionsService<C> {
    /// Permission decision: `{allow, scope ∈ {once, session, project},
    /// tool_name?}`. Session/project scopes persist the grant; deny
    /// stops the task.
    async fn decide(&self, ctx: &CallCtx, id: &str, params: Value) -> Result<Value, AgorError> {
        let session: Session = self.state.store.get(id)?;
        self.can_prompt(&session, ctx)?;

        let allow = params
            .get("allow")
            .and_then(Value::as_bool)
            .ok_or_else(|| AgorError::validation("allow is required"))?;
        let scope = params.get("scope").and_then(Value::as_str).unwrap_or("once");
        if !matches!(scope, "once" | "session" | "project") {
            return Err(AgorError::validation(format!("invalid decision scope {scope:?}")));
        }
        let tool_name = params.get("tool_name").and_then(Value::as_str);

        let awaiting = session
            .tasks
            .iter()
            .rev()
            .filter_map(|t| self.state.store.maybe_get::<Task>(t.as_str()))
            .find(|t| t.status == agor_core::TaskStatus::AwaitingPermission);
        let Some(task) = awaiting else {
            return Err(AgorError::new(
                ErrorKind::ValidationFailed,
                "session has no task awaiting permission",
            ));
        };

        if allow {
            if let Some(tool_name) = tool_name {
                match scope {
                    "session" => {
                        self.state.store.update::<Session>(id, |s| {
                            if !s.permission_config.allowed_tools.iter().any(|t| t == tool_name) {
                                s.permission_config.allowed_tools.push(tool_name.to_string());
                            }
                        })?;
                    }
                    "project" => {
                        let worktree_id = session.worktree_id.to_string();
                        self.state.store.patch::<Worktree>(
                            &worktree_id,
                            json!({"environment_instance": {"allowed_tools": [tool_name]}}),
                        )?;
                    }
                    _ => {}
                }
            }
            // Resume: the adapter proceeds once its CLI sees the grant.
            let task = self.state.store.patch::<Task>(
                task.task_id.as_str(),
                json!({"status": agor_core::TaskStatus::Running}),
            )?;
            self.state.engine.handle_task_transition(&task);
            Ok(json!({"allowed": true, "task_id": task.task_id}))
        } else {
            let result = self
                .state
                .engine
                .stop_task(id, Some(task.task_id.as_str()))
                .await?;
            Ok(json!({"allowed": false, "result": format!("{result:?}")}))
        }
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
