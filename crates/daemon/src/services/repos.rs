// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The repos service: registered clones and their Unix groups.

use super::{CallCtx, Service};
use crate::hooks::{admin_writes, require_authenticated, HookSet};
use crate::state::AppState;
use agor_core::{
    derive_unix_username, repo_group, AgorError, Clock, ErrorKind, Repo, RepoId, User, Worktree,
    WorktreeOwner,
};
use agor_engine::RepoSyncView;
use agor_wire::{ExecutorAction, ExecutorPayload, FindQuery, GitCloneParams, SyncRepoParams};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct ReposService<C: Clock + 'static> {
    state: Arc<AppState<C>>,
}

impl<C: Clock + 'static> ReposService<C> {
    pub fn new(state: Arc<AppState<C>>) -> Arc<Self> {
        Arc::new(Self { state })
    }

    fn to_value(repo: Repo) -> Result<Value, AgorError> {
        serde_json::to_value(repo)
            .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
    }

    /// Unix usernames of everyone holding a worktree of this repo.
    fn member_usernames(&self, repo_id: &RepoId) -> Vec<String> {
        let worktrees: Vec<Worktree> = self
            .state
            .store
            .all::<Worktree>()
            .into_iter()
            .filter(|w| &w.repo_id == repo_id)
            .collect();
        let mut members: Vec<String> = Vec::new();
        for owner in self.state.store.all::<WorktreeOwner>() {
            if !worktrees.iter().any(|w| w.worktree_id == owner.worktree_id) {
                continue;
            }
            let Some(user) = self.state.store.maybe_get::<User>(owner.user_id.as_str()) else {
                continue;
            };
            let username =
                user.unix_username.unwrap_or_else(|| derive_unix_username(&user.email));
            if !members.contains(&username) {
                members.push(username);
            }
        }
        members.sort();
        members
    }
}

#[async_trait]
impl<C: Clock + 'static> Service<C> for ReposService<C> {
    fn name(&self) -> &'static str {
        "repos"
    }

    fn hooks(&self) -> HookSet {
        HookSet::new().before(require_authenticated()).before(admin_writes())
    }

    async fn find(&self, _ctx: &CallCtx, query: FindQuery) -> Result<Vec<Value>, AgorError> {
        Ok(query.apply(self.state.store.all_raw(agor_storage::Table::Repos)))
    }

    async fn get(&self, _ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        Self::to_value(self.state.store.get::<Repo>(id)?)
    }

    /// Register a repo and dispatch the clone.
    async fn create(&self, ctx: &CallCtx, data: Value) -> Result<Value, AgorError> {
        let slug = data
            .get("slug")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("slug is required"))?
            .to_string();
        if !Repo::is_valid_slug(&slug) {
            return Err(AgorError::validation(format!("invalid slug {slug:?}; expected org/name")));
        }
        let remote_url = data
            .get("remote_url")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("remote_url is required"))?
            .to_string();
        let default_branch = data
            .get("default_branch")
            .and_then(Value::as_str)
            .unwrap_or("main")
            .to_string();

        let repo_id = RepoId::new();
        let now = self.state.store.clock().utc_now();
        let repo = Repo {
            repo_id: repo_id.clone(),
            local_path: self.state.data_home.join("repos").join(&slug),
            remote_url: remote_url.clone(),
            slug,
            default_branch,
            unix_group: self.state.config.rbac.enabled.then(|| repo_group(&repo_id)),
            environment_config: data.get("environment_config").cloned(),
            created_by: ctx.principal.user().map(|u| u.user_id.clone()),
            next_worktree_unique_id: 0,
            created_at: now,
            updated_at: now,
        };
        let repo = self.state.store.create(repo)?;

        // Clone unless the caller says the path already exists.
        let skip_clone =
            data.get("skip_clone").and_then(Value::as_bool).unwrap_or(false);
        if !skip_clone {
            let token = self.state.auth.executor_token(
                ctx.principal.user().map(|u| u.user_id.as_str()).unwrap_or("system"),
                repo.repo_id.as_str(),
            );
            let payload = ExecutorPayload::new(
                ExecutorAction::GitClone(GitCloneParams {
                    repo_id: repo.repo_id.clone(),
                    remote_url,
                    local_path: repo.local_path.clone(),
                    default_branch: Some(repo.default_branch.clone()),
                }),
                token,
            );
            self.state.dispatch_executor(payload).await?;
        }
        Self::to_value(repo)
    }

    async fn patch(&self, _ctx: &CallCtx, id: &str, data: Value) -> Result<Value, AgorError> {
        Self::to_value(self.state.store.patch::<Repo>(id, data)?)
    }

    async fn remove(&self, _ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        let repo: Repo = self.state.store.get(id)?;
        let in_use = self.state.store.all::<Worktree>().iter().any(|w| w.repo_id == repo.repo_id);
        if in_use {
            return Err(AgorError::new(
                ErrorKind::Conflict,
                format!("repo {} still has worktrees", repo.slug),
            ));
        }
        Self::to_value(self.state.store.remove::<Repo>(id)?)
    }

    async fn call(
        &self,
        ctx: &CallCtx,
        route: &str,
        id: Option<&str>,
        params: Value,
    ) -> Result<Value, AgorError> {
        match route {
            "sync-view" => {
                let repo: Repo = self.state.store.get(id.ok_or_else(|| {
                    AgorError::validation("sync-view requires a repo id")
                })?)?;
                let view = RepoSyncView {
                    group: repo.unix_group.clone().unwrap_or_else(|| repo_group(&repo.repo_id)),
                    local_path: repo.local_path.clone(),
                    members: self.member_usernames(&repo.repo_id),
                    daemon_user: self.state.config.rbac.daemon_user.clone(),
                };
                Ok(json!({
                    "runner": self.state.config.rbac.runner_kind(),
                    "view": view,
                }))
            }
            "sync" => {
                let repo: Repo = self.state.store.get(id.ok_or_else(|| {
                    AgorError::validation("sync requires a repo id")
                })?)?;
                let token = self.state.auth.executor_token(
                    ctx.principal.user().map(|u| u.user_id.as_str()).unwrap_or("system"),
                    repo.repo_id.as_str(),
                );
                let payload = ExecutorPayload::new(
                    ExecutorAction::SyncRepo(SyncRepoParams {
                        repo_id: repo.repo_id.clone(),
                        daemon_user: self.state.config.rbac.daemon_user.clone(),
                        delete: params.get("delete").and_then(Value::as_bool).unwrap_or(false),
                    }),
                    token,
                );
                self.state.dispatch_executor(payload).await?;
                Ok(json!({"dispatched": true}))
            }
            other => Err(AgorError::not_found(format!("repos route {other:?}"))),
        }
    }
}
