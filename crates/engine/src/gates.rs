// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session prompt gates.
//!
//! The gate is the single point where task-creation races resolve: the
//! critical section covers the read-check-insert of the pending task
//! row, so two concurrent prompts can never both pass.

use agor_core::SessionId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

#[derive(Default)]
pub struct SessionGates {
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionGates {
    /// Acquire the gate for `session_id`, waiting if another prompt is
    /// inside the critical section.
    pub async fn lock(&self, session_id: &SessionId) -> OwnedMutexGuard<()> {
        let gate = {
            let mut gates = self.gates.lock();
            gates.entry(session_id.to_string()).or_default().clone()
        };
        gate.lock_owned().await
    }

    /// Drop a session's gate (session removed).
    pub fn forget(&self, session_id: &SessionId) {
        self.gates.lock().remove(session_id.as_str());
    }
}

#[cfg(test)]
#[path = "gates_tests.rs"]
mod tests;
