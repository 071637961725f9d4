// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree lifecycle orchestration.
//!
//! The daemon inserts the row and dispatches the executor; the executor
//! runs `git worktree add`, applies group/ACLs, and patches the row to
//! `ready` or `failed` through the worktrees service. The watch here
//! only repairs rows whose executor died without reporting.

use crate::spawn::SpawnRequest;
use crate::Engine;
use agor_core::{
    worktree_group, AgorError, BoardId, Clock, ErrorKind, Event, FilesystemStatus, OthersCan,
    OthersFsAccess, RefType, Repo, UserId, Worktree, WorktreeId, WorktreeOwner,
};
use agor_wire::{ExecutorAction, ExecutorPayload, WorktreeAddParams, WorktreeRemoveParams};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CreateWorktreeParams {
    pub repo: String,
    pub name: String,
    /// Branch/tag/sha to mount; defaults to `name` as a new branch.
    pub ref_name: Option<String>,
    pub ref_type: RefType,
    /// Start point for a new branch; defaults to the repo default branch.
    pub base_ref: Option<String>,
    pub create_branch: bool,
    pub created_by: UserId,
    pub others_can: OthersCan,
    pub others_fs_access: OthersFsAccess,
    pub board_id: Option<BoardId>,
}

impl<C: Clock + 'static> Engine<C> {
    /// Insert the `creating` row, grant ownership, dispatch the add.
    pub async fn create_worktree(
        self: &Arc<Self>,
        params: CreateWorktreeParams,
    ) -> Result<Worktree, AgorError> {
        let repo: Repo = self.store.get(&params.repo)?;
        if repo.next_worktree_unique_id == u16::MAX {
            return Err(AgorError::new(
                ErrorKind::Conflict,
                format!("repo {} exhausted its worktree id space", repo.slug),
            ));
        }
        let repo = self.store.update::<Repo>(repo.repo_id.as_str(), |r| {
            r.next_worktree_unique_id += 1;
        })?;
        let unique_id = repo.next_worktree_unique_id - 1;

        let worktree_id = WorktreeId::new();
        let now = self.store.clock().utc_now();
        let path = self.config.data_home.join("worktrees").join(&repo.slug).join(&params.name);
        let ref_name = params.ref_name.clone().unwrap_or_else(|| params.name.clone());
        let base_ref =
            params.base_ref.clone().unwrap_or_else(|| repo.default_branch.clone());
        let worktree = Worktree {
            worktree_id: worktree_id.clone(),
            repo_id: repo.repo_id.clone(),
            name: params.name.clone(),
            ref_name: ref_name.clone(),
            ref_type: params.ref_type,
            path: path.clone(),
            base_ref: Some(base_ref.clone()),
            new_branch: params.create_branch,
            worktree_unique_id: unique_id,
            board_id: params.board_id.clone(),
            created_by: params.created_by.clone(),
            filesystem_status: FilesystemStatus::Creating,
            others_can: params.others_can,
            others_fs_access: params.others_fs_access,
            unix_group: self.config.unix_rbac.then(|| worktree_group(&worktree_id)),
            environment_instance: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        let worktree = self.store.create(worktree)?;
        self.store.create(WorktreeOwner {
            worktree_id: worktree_id.clone(),
            user_id: params.created_by.clone(),
            created_at: now,
        })?;
        self.events.publish(Event::WorktreeStatusChanged {
            worktree_id: worktree_id.clone(),
            status: FilesystemStatus::Creating,
            error: None,
        });

        let token = self
            .tokens
            .mint_executor_token(params.created_by.as_str(), worktree_id.as_str());
        let mut payload = ExecutorPayload::new(
            ExecutorAction::WorktreeAdd(WorktreeAddParams {
                worktree_id: worktree_id.clone(),
                repo_id: repo.repo_id.clone(),
                repo_path: repo.local_path.clone(),
                worktree_name: params.name.clone(),
                worktree_path: path,
                branch: Some(ref_name),
                source_branch: Some(base_ref),
                create_branch: params.create_branch,
                init_unix_group: self.config.unix_rbac,
                others_access: params.others_fs_access,
                daemon_user: self.config.daemon_user.clone(),
                repo_unix_group: repo.unix_group.clone(),
            }),
            token,
        );
        payload.daemon_url = Some(self.config.daemon_url.clone());
        payload.data_home = Some(self.config.data_home.clone());

        self.dispatch_git(payload, &worktree_id).await;
        Ok(worktree)
    }

    /// Dispatch the filesystem removal; the executor deletes the row and
    /// fires `unix.sync-worktree(delete)` when it is done.
    pub async fn remove_worktree(
        self: &Arc<Self>,
        worktree_ref: &str,
        requested_by: &UserId,
        force: bool,
    ) -> Result<(), AgorError> {
        let worktree: Worktree = self.store.get(worktree_ref)?;
        let repo: Repo = self.store.get(worktree.repo_id.as_str())?;

        let token = self
            .tokens
            .mint_executor_token(requested_by.as_str(), worktree.worktree_id.as_str());
        let mut payload = ExecutorPayload::new(
            ExecutorAction::WorktreeRemove(WorktreeRemoveParams {
                worktree_id: worktree.worktree_id.clone(),
                repo_path: repo.local_path.clone(),
                worktree_path: worktree.path.clone(),
                force,
            }),
            token,
        );
        payload.daemon_url = Some(self.config.daemon_url.clone());
        payload.data_home = Some(self.config.data_home.clone());

        self.dispatch_git(payload, &worktree.worktree_id).await;
        Ok(())
    }

    /// Deterministic host ports for a worktree.
    pub fn worktree_ports(&self, worktree: &Worktree) -> (u16, u16) {
        let bases = self.config.port_bases;
        (
            bases.ssh_port(worktree.worktree_unique_id),
            bases.app_port(worktree.worktree_unique_id),
        )
    }

    /// Spawn a git executor (as the daemon user, sudo-wrapped for fresh
    /// group membership) and watch for unreported deaths.
    async fn dispatch_git(self: &Arc<Self>, payload: ExecutorPayload, worktree_id: &WorktreeId) {
        let command = payload.command();
        let request = SpawnRequest {
            payload,
            run_as: None,
            sudo_self_as: self.config.daemon_user.clone(),
        };
        let handle = match self.spawner.spawn(request).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(%worktree_id, command, error = %e, "git executor spawn failed");
                self.mark_worktree_failed(worktree_id, &e.message);
                return;
            }
        };

        let engine = self.clone();
        let worktree_id = worktree_id.clone();
        tokio::spawn(async move {
            let exit = handle.wait().await;
            if exit.success() {
                return;
            }
            let still_creating = engine
                .store
                .maybe_get::<Worktree>(worktree_id.as_str())
                .is_some_and(|w| w.filesystem_status == FilesystemStatus::Creating);
            let message = exit
                .result
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or_else(|| format!("executor exited with code {}", exit.code));
            info!(%worktree_id, command, message, "git executor failed");
            if still_creating {
                engine.mark_worktree_failed(&worktree_id, &message);
            }
        });
    }

    pub(crate) fn mark_worktree_failed(&self, worktree_id: &WorktreeId, message: &str) {
        let patch = json!({
            "filesystem_status": FilesystemStatus::Failed,
            "last_error": message,
        });
        match self.store.patch::<Worktree>(worktree_id.as_str(), patch) {
            Ok(_) => self.events.publish(Event::WorktreeStatusChanged {
                worktree_id: worktree_id.clone(),
                status: FilesystemStatus::Failed,
                error: Some(AgorError::new(ErrorKind::GitError, message)),
            }),
            Err(e) => warn!(%worktree_id, error = %e, "failed-state patch failed"),
        }
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
