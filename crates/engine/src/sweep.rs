// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup sweeps: repair state orphaned by a daemon crash.

use crate::Engine;
use agor_core::{
    AgorError, Clock, ErrorKind, FilesystemStatus, TaskStatus, Worktree,
};
use agor_storage::Store;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// What a sweep repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub tasks_failed: usize,
    pub worktrees_failed: usize,
}

impl<C: Clock + 'static> Engine<C> {
    /// Run once at daemon startup, before the listener accepts work.
    ///
    /// Any non-terminal task at this point has no live executor (the
    /// registry is empty after a restart); a `pending` one never
    /// started, a `running`/`awaiting` one lost its process. Worktrees
    /// stuck in `creating` past the age limit go to `failed`.
    pub async fn startup_sweep(self: &Arc<Self>) -> SweepReport {
        let mut report = SweepReport::default();

        for task in self.store.all::<agor_core::Task>() {
            if task.status.is_terminal() {
                continue;
            }
            let reason = if task.status == TaskStatus::Pending {
                "executor-never-started"
            } else {
                "executor-lost-on-restart"
            };
            info!(task = %task.task_id, status = %task.status, reason, "sweeping orphaned task");
            let result = self
                .finalize_task(
                    &task.task_id,
                    TaskStatus::Failed,
                    Some(AgorError::new(ErrorKind::ExecutorCrashed, reason)),
                    None,
                )
                .await;
            match result {
                Ok(_) => report.tasks_failed += 1,
                Err(e) => warn!(task = %task.task_id, error = %e, "task sweep failed"),
            }
        }

        report.worktrees_failed = sweep_stale_worktrees(
            &self.store,
            self.config.creating_max_age,
            |worktree_id| {
                self.events.publish(agor_core::Event::WorktreeStatusChanged {
                    worktree_id: worktree_id.clone(),
                    status: FilesystemStatus::Failed,
                    error: Some(AgorError::new(
                        ErrorKind::FilesystemError,
                        "worktree creation never completed",
                    )),
                });
            },
        );

        report
    }
}

/// Age-check `creating` worktrees; returns how many were failed.
fn sweep_stale_worktrees<C: Clock>(
    store: &Arc<Store<C>>,
    max_age: std::time::Duration,
    mut on_failed: impl FnMut(&agor_core::WorktreeId),
) -> usize {
    let now = store.clock().utc_now();
    let mut failed = 0;
    for worktree in store.all::<Worktree>() {
        if worktree.filesystem_status != FilesystemStatus::Creating {
            continue;
        }
        let age = now.signed_duration_since(worktree.created_at);
        if age.num_milliseconds() < max_age.as_millis() as i64 {
            continue;
        }
        info!(worktree = %worktree.worktree_id, age_s = age.num_seconds(), "sweeping stale worktree");
        let patch = json!({
            "filesystem_status": FilesystemStatus::Failed,
            "last_error": "worktree creation never completed",
        });
        match store.patch::<Worktree>(worktree.worktree_id.as_str(), patch) {
            Ok(_) => {
                on_failed(&worktree.worktree_id);
                failed += 1;
            }
            Err(e) => warn!(worktree = %worktree.worktree_id, error = %e, "worktree sweep failed"),
        }
    }
    failed
}

#[cfg(test)]
#[path = "sweep_tests.rs"]
mod tests;
