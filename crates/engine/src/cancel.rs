// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task cancellation: cooperative stop, then SIGTERM, then SIGKILL.

use crate::spawn::ExecutorHandle;
use crate::Engine;
use agor_core::{AgorError, Clock, Session, SessionId, Task, TaskId, TaskStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// One running executor, keyed by task.
pub(crate) struct AbortEntry {
    pub handle: Arc<ExecutorHandle>,
    pub session_id: SessionId,
    pub stop_requested: AtomicBool,
}

#[derive(Default)]
pub(crate) struct AbortRegistry {
    entries: Mutex<HashMap<String, Arc<AbortEntry>>>,
}

impl AbortRegistry {
    pub fn register(
        &self,
        session_id: &SessionId,
        task_id: &TaskId,
        handle: Arc<ExecutorHandle>,
    ) -> Arc<AbortEntry> {
        let entry = Arc::new(AbortEntry {
            handle,
            session_id: session_id.clone(),
            stop_requested: AtomicBool::new(false),
        });
        self.entries.lock().insert(task_id.to_string(), entry.clone());
        entry
    }

    pub fn get(&self, task_id: &TaskId) -> Option<Arc<AbortEntry>> {
        self.entries.lock().get(task_id.as_str()).cloned()
    }

    pub fn remove(&self, task_id: &TaskId) {
        self.entries.lock().remove(task_id.as_str());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// All live handles (daemon shutdown broadcast).
    pub fn all(&self) -> Vec<Arc<AbortEntry>> {
        self.entries.lock().values().cloned().collect()
    }
}

/// Outcome of a stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopResult {
    /// Abort fired; the task will transition once streaming drains.
    Stopping { task_id: TaskId },
    /// The task was already terminal — nothing changed, no events.
    AlreadyTerminal { task_id: TaskId, status: TaskStatus },
    /// The session has no task to stop.
    NoActiveTask,
}

impl<C: Clock + 'static> Engine<C> {
    /// Stop a task. Without an explicit `task_id`, the most recent
    /// non-terminal task of the session is the target. Idempotent.
    pub async fn stop_task(
        self: &Arc<Self>,
        session_ref: &str,
        task_ref: Option<&str>,
    ) -> Result<StopResult, AgorError> {
        let session: Session = self.store.get(session_ref)?;

        let task: Task = match task_ref {
            Some(task_ref) => self.store.get(task_ref)?,
            None => {
                let mut found = None;
                for task_id in session.tasks.iter().rev() {
                    if let Some(task) = self.store.maybe_get::<Task>(task_id.as_str()) {
                        if !task.status.is_terminal() {
                            found = Some(task);
                            break;
                        }
                    }
                }
                match found {
                    Some(task) => task,
                    None => return Ok(StopResult::NoActiveTask),
                }
            }
        };

        if task.status.is_terminal() {
            debug!(task = %task.task_id, status = %task.status, "stop on terminal task is a no-op");
            return Ok(StopResult::AlreadyTerminal { task_id: task.task_id, status: task.status });
        }

        match self.aborts().get(&task.task_id) {
            Some(entry) => {
                entry.stop_requested.store(true, Ordering::SeqCst);
                let engine = self.clone();
                let task_id = task.task_id.clone();
                tokio::spawn(async move {
                    engine.escalate(entry, task_id).await;
                });
                Ok(StopResult::Stopping { task_id: task.task_id })
            }
            None => {
                // Pending task whose executor never started (or a
                // daemon restart lost the handle): finalize directly.
                info!(task = %task.task_id, "stopping task with no live executor");
                self.finalize_task(&task.task_id, TaskStatus::Stopped, None, None).await?;
                Ok(StopResult::Stopping { task_id: task.task_id })
            }
        }
    }

    /// Cooperative stop → SIGTERM (grace) → SIGKILL (grace).
    async fn escalate(self: &Arc<Self>, entry: Arc<AbortEntry>, task_id: TaskId) {
        let handle = &entry.handle;
        handle.send_stop().await;

        tokio::time::sleep(self.config.stop_grace).await;
        if handle.try_exited().is_some() {
            return;
        }
        debug!(task = %task_id, "stop grace elapsed; SIGTERM");
        handle.signal_term();

        tokio::time::sleep(self.config.kill_grace).await;
        if handle.try_exited().is_some() {
            return;
        }
        debug!(task = %task_id, "kill grace elapsed; SIGKILL");
        handle.signal_kill();
    }

    /// Broadcast abort to every live executor (daemon shutdown).
    pub async fn abort_all(self: &Arc<Self>) {
        for entry in self.aborts().all() {
            entry.stop_requested.store(true, Ordering::SeqCst);
            entry.handle.send_stop().await;
            entry.handle.signal_term();
        }
    }

    /// Number of live executors.
    pub fn executors_running(&self) -> usize {
        self.aborts().len()
    }
}

#[cfg(test)]
#[path = "cancel_tests.rs"]
mod tests;
