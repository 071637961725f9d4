// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worktrees service: lifecycle orchestration, owners, unix sync.

use super::{CallCtx, Service};
use crate::hooks::{require_authenticated, HookSet, Principal};
use crate::state::AppState;
use agor_core::{
    derive_unix_username, worktree_group, AgorError, BoardId, Clock, ErrorKind, Event,
    FilesystemStatus, OthersCan, OthersFsAccess, RefType, Repo, Role, User, Worktree,
    WorktreeOwner,
};
use agor_engine::{CreateWorktreeParams, WorktreeSyncView};
use agor_wire::{ExecutorAction, ExecutorPayload, FindQuery, SyncWorktreeParams};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct WorktreesService<C: Clock + 'static> {
    state: Arc<AppState<C>>,
}

impl<C: Clock + 'static> WorktreesService<C> {
    pub fn new(state: Arc<AppState<C>>) -> Arc<Self> {
        Arc::new(Self { state })
    }

    fn to_value(worktree: Worktree) -> Result<Value, AgorError> {
        serde_json::to_value(worktree)
            .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
    }

    fn is_owner(&self, worktree: &Worktree, user: &User) -> bool {
        self.state
            .store
            .maybe_get::<WorktreeOwner>(&WorktreeOwner::key(&worktree.worktree_id, &user.user_id))
            .is_some()
    }

    /// Owners and admins mutate; executors finalize their own dispatch.
    fn write_guard(&self, ctx: &CallCtx, worktree: &Worktree) -> Result<(), AgorError> {
        match &ctx.principal {
            Principal::Executor { .. } | Principal::Internal { .. } => Ok(()),
            principal => {
                let Some(user) = principal.user() else {
                    return Err(AgorError::new(
                        ErrorKind::NotAuthenticated,
                        "authentication required",
                    ));
                };
                if user.role.is_admin() || self.is_owner(worktree, user) {
                    Ok(())
                } else {
                    Err(AgorError::forbidden("only worktree owners may modify it"))
                }
            }
        }
    }

    fn sync_view(&self, worktree: &Worktree) -> Result<WorktreeSyncView, AgorError> {
        let repo: Repo = self.state.store.get(worktree.repo_id.as_str())?;
        let mut owners = Vec::new();
        let mut owner_homes = Vec::new();
        for owner in self.state.store.all::<WorktreeOwner>() {
            if owner.worktree_id != worktree.worktree_id {
                continue;
            }
            let Some(user) = self.state.store.maybe_get::<User>(owner.user_id.as_str()) else {
                continue;
            };
            let username =
                user.unix_username.unwrap_or_else(|| derive_unix_username(&user.email));
            owner_homes.push((username.clone(), std::path::PathBuf::from("/home").join(&username)));
            owners.push(username);
        }
        owners.sort();
        Ok(WorktreeSyncView {
            group: worktree
                .unix_group
                .clone()
                .unwrap_or_else(|| worktree_group(&worktree.worktree_id)),
            path: worktree.path.clone(),
            worktree_name: worktree.name.clone(),
            owners,
            daemon_user: self.state.config.rbac.daemon_user.clone(),
            others_fs_access: worktree.others_fs_access,
            git_metadata_dir: Some(
                repo.local_path.join(".git").join("worktrees").join(&worktree.name),
            ),
            owner_homes,
        })
    }

    async fn dispatch_sync(&self, worktree: &Worktree, delete: bool) -> Result<(), AgorError> {
        let token = self
            .state
            .auth
            .executor_token(worktree.created_by.as_str(), worktree.worktree_id.as_str());
        let payload = ExecutorPayload::new(
            ExecutorAction::SyncWorktree(SyncWorktreeParams {
                worktree_id: worktree.worktree_id.clone(),
                daemon_user: self.state.config.rbac.daemon_user.clone(),
                delete,
            }),
            token,
        );
        self.state.dispatch_executor(payload).await
    }
}

#[async_trait]
impl<C: Clock + 'static> Service<C> for WorktreesService<C> {
    fn name(&self) -> &'static str {
        "worktrees"
    }

    fn hooks(&self) -> HookSet {
        HookSet::new().before(require_authenticated())
    }

    async fn find(&self, _ctx: &CallCtx, query: FindQuery) -> Result<Vec<Value>, AgorError> {
        Ok(query.apply(self.state.store.all_raw(agor_storage::Table::Worktrees)))
    }

    async fn get(&self, _ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        Self::to_value(self.state.store.get::<Worktree>(id)?)
    }

    async fn create(&self, ctx: &CallCtx, data: Value) -> Result<Value, AgorError> {
        let user = ctx.principal.user().ok_or_else(|| {
            AgorError::new(ErrorKind::NotAuthenticated, "worktree creation requires a user")
        })?;
        if user.role == Role::Viewer {
            return Err(AgorError::forbidden("viewers cannot create worktrees"));
        }
        let repo = data
            .get("repo_id")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("repo_id is required"))?;
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("name is required"))?;
        let ref_type: RefType = match data.get("ref_type") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|_| AgorError::validation(format!("invalid ref_type {value}")))?,
            None => RefType::Branch,
        };
        let others_can: OthersCan = match data.get("others_can") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|_| AgorError::validation(format!("invalid others_can {value}")))?,
            None => OthersCan::default(),
        };
        let others_fs_access: OthersFsAccess = match data.get("others_fs_access") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|_| AgorError::validation(format!("invalid others_fs_access {value}")))?,
            None => OthersFsAccess::default(),
        };

        let params = CreateWorktreeParams {
            repo: repo.to_string(),
            name: name.to_string(),
            ref_name: data.get("ref").and_then(Value::as_str).map(str::to_string),
            ref_type,
            base_ref: data.get("base_ref").and_then(Value::as_str).map(str::to_string),
            create_branch: data.get("new_branch").and_then(Value::as_bool).unwrap_or(true),
            created_by: user.user_id.clone(),
            others_can,
            others_fs_access,
            board_id: data
                .get("board_id")
                .and_then(Value::as_str)
                .map(BoardId::from_string),
        };
        Self::to_value(self.state.engine.create_worktree(params).await?)
    }

    async fn patch(&self, ctx: &CallCtx, id: &str, data: Value) -> Result<Value, AgorError> {
        let before: Worktree = self.state.store.get(id)?;
        self.write_guard(ctx, &before)?;

        let after: Worktree = self.state.store.patch(id, data)?;
        if after.filesystem_status != before.filesystem_status {
            self.state.hub.broadcast(Event::WorktreeStatusChanged {
                worktree_id: after.worktree_id.clone(),
                status: after.filesystem_status,
                error: after.last_error.as_ref().map(|m| {
                    AgorError::new(ErrorKind::FilesystemError, m.clone())
                }),
            });
        }
        // Sharing changes ripple to the filesystem ACLs.
        if self.state.config.rbac.enabled && after.others_fs_access != before.others_fs_access {
            self.dispatch_sync(&after, false).await?;
        }
        Self::to_value(after)
    }

    async fn remove(&self, ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        let worktree: Worktree = self.state.store.get(id)?;
        self.write_guard(ctx, &worktree)?;

        match &ctx.principal {
            // The executor finished the filesystem removal: drop the row
            // and the owner junction.
            Principal::Executor { .. } | Principal::Internal { .. } => {
                let removed: Worktree = self.state.store.remove(id)?;
                for owner in self.state.store.all::<WorktreeOwner>() {
                    if owner.worktree_id == removed.worktree_id {
                        let _ = self.state.store.remove::<WorktreeOwner>(&WorktreeOwner::key(
                            &owner.worktree_id,
                            &owner.user_id,
                        ));
                    }
                }
                self.state.hub.broadcast(Event::WorktreeStatusChanged {
                    worktree_id: removed.worktree_id.clone(),
                    status: FilesystemStatus::Removed,
                    error: None,
                });
                Self::to_value(removed)
            }
            // A user asked: dispatch the removal; the executor calls
            // back into this verb when the filesystem is gone.
            principal => {
                let user = principal.user().map(|u| u.user_id.clone()).unwrap_or_default();
                self.state.engine.remove_worktree(id, &user, true).await?;
                Ok(json!({"removing": true, "worktree_id": worktree.worktree_id}))
            }
        }
    }

    async fn call(
        &self,
        ctx: &CallCtx,
        route: &str,
        id: Option<&str>,
        params: Value,
    ) -> Result<Value, AgorError> {
        let id =
            id.ok_or_else(|| AgorError::validation(format!("{route} requires a worktree id")))?;
        let worktree: Worktree = self.state.store.get(id)?;
        match route {
            "sync-view" => {
                let view = self.sync_view(&worktree)?;
                Ok(json!({
                    "runner": self.state.config.rbac.runner_kind(),
                    "view": view,
                }))
            }
            "sync" => {
                self.write_guard(ctx, &worktree)?;
                let delete = params.get("delete").and_then(Value::as_bool).unwrap_or(false);
                self.dispatch_sync(&worktree, delete).await?;
                Ok(json!({"dispatched": true}))
            }
            // Only a worktree owner (or admin) may mutate owners.
            "add-owner" => {
                self.write_guard(ctx, &worktree)?;
                let user: User = self.state.store.get(
                    params
                        .get("user_id")
                        .and_then(Value::as_str)
                        .ok_or_else(|| AgorError::validation("user_id is required"))?,
                )?;
                let owner = WorktreeOwner {
                    worktree_id: worktree.worktree_id.clone(),
                    user_id: user.user_id.clone(),
                    created_at: self.state.store.clock().utc_now(),
                };
                self.state.store.create(owner)?;
                if self.state.config.rbac.enabled {
                    self.dispatch_sync(&worktree, false).await?;
                }
                Ok(json!({"added": user.user_id}))
            }
            "remove-owner" => {
                self.write_guard(ctx, &worktree)?;
                let user_id = params
                    .get("user_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AgorError::validation("user_id is required"))?;
                let key = WorktreeOwner::key(
                    &worktree.worktree_id,
                    &agor_core::UserId::from_string(user_id),
                );
                self.state.store.remove::<WorktreeOwner>(&key)?;
                if self.state.config.rbac.enabled {
                    self.dispatch_sync(&worktree, false).await?;
                }
                Ok(json!({"removed": user_id}))
            }
            "owners" => {
                let owners: Vec<Value> = self
                    .state
                    .store
                    .all::<WorktreeOwner>()
                    .into_iter()
                    .filter(|o| o.worktree_id == worktree.worktree_id)
                    .filter_map(|o| serde_json::to_value(o).ok())
                    .collect();
                Ok(json!(owners))
            }
            // Deterministic host ports for this worktree.
            "info" => {
                let (ssh, app) = self.state.engine.worktree_ports(&worktree);
                Ok(json!({
                    "worktree_id": worktree.worktree_id,
                    "ssh_port": ssh,
                    "app_port": app,
                    "path": worktree.path,
                    "filesystem_status": worktree.filesystem_status,
                }))
            }
            other => Err(AgorError::not_found(format!("worktrees route {other:?}"))),
        }
    }
}
