// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session usage context for normalization and context-window math.

use crate::Engine;
use agor_core::{AgorError, Clock, Session, Task};
use serde_json::Value;

/// Raw-response history a tool adapter needs to normalize a new result.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UsageContext {
    /// Raw response of the most recent terminal task, if any.
    pub previous_raw: Option<Value>,
    /// Raw responses of all terminal tasks, oldest first.
    pub history: Vec<Value>,
}

impl<C: Clock + 'static> Engine<C> {
    /// Collect the terminal-task raw responses for a session, excluding
    /// `current_task` (the one being finalized).
    pub fn usage_context(
        &self,
        session_ref: &str,
        current_task: Option<&str>,
    ) -> Result<UsageContext, AgorError> {
        let session: Session = self.store.get(session_ref)?;
        let mut history = Vec::new();
        for task_id in &session.tasks {
            if current_task.is_some_and(|c| task_id.as_str().starts_with(c) || c == task_id.as_str())
            {
                continue;
            }
            let Some(task) = self.store.maybe_get::<Task>(task_id.as_str()) else { continue };
            if task.status.is_terminal() {
                if let Some(raw) = task.raw_sdk_response {
                    history.push(raw);
                }
            }
        }
        Ok(UsageContext { previous_raw: history.last().cloned(), history })
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
