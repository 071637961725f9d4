// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The terminals service: PTY registration, I/O relay, SSH endpoints.
//!
//! The executor owns the PTY; this service owns identity, authz, and
//! the channel relay. Only admins and owners may open terminals.

use super::{CallCtx, Service};
use crate::hooks::{require_authenticated, HookSet, Principal};
use crate::state::AppState;
use agor_core::{AgorError, Clock, ErrorKind, Event, Role, UserId, WorktreeId};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// One live (or registered) terminal.
#[derive(Debug, Clone)]
pub struct TerminalEntry {
    pub terminal_id: String,
    pub user_id: UserId,
    pub worktree_id: Option<WorktreeId>,
    pub session_name: String,
}

/// SSH endpoint registered for a worktree.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SshEndpoint {
    pub worktree_id: WorktreeId,
    pub host: String,
    pub port: u16,
}

#[derive(Default)]
pub struct TerminalRegistry {
    terminals: Mutex<HashMap<String, TerminalEntry>>,
    ssh: Mutex<HashMap<String, SshEndpoint>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl TerminalRegistry {
    pub fn active_count(&self) -> usize {
        self.terminals.lock().len()
    }
}

pub struct TerminalsService<C: Clock + 'static> {
    state: Arc<AppState<C>>,
}

impl<C: Clock + 'static> TerminalsService<C> {
    pub fn new(state: Arc<AppState<C>>) -> Arc<Self> {
        Arc::new(Self { state })
    }

    /// Terminals are for `{admin, owner}` only.
    fn terminal_guard(ctx: &CallCtx) -> Result<(), AgorError> {
        match &ctx.principal {
            Principal::Executor { .. } | Principal::Internal { .. } => Ok(()),
            principal => match principal.role() {
                Some(Role::Admin) | Some(Role::Owner) => Ok(()),
                Some(_) => Err(AgorError::forbidden("terminals require the admin role")),
                None => Err(AgorError::new(
                    ErrorKind::NotAuthenticated,
                    "authentication required",
                )),
            },
        }
    }

    fn entry(&self, terminal_id: &str) -> Result<TerminalEntry, AgorError> {
        self.state
            .terminals
            .terminals
            .lock()
            .get(terminal_id)
            .cloned()
            .ok_or_else(|| AgorError::not_found(format!("terminal {terminal_id}")))
    }
}

#[async_trait]
impl<C: Clock + 'static> Service<C> for TerminalsService<C> {
    fn name(&self) -> &'static str {
        "terminals"
    }

    fn hooks(&self) -> HookSet {
        HookSet::new().before(require_authenticated())
    }

    async fn find(&self, ctx: &CallCtx, _query: agor_wire::FindQuery) -> Result<Vec<Value>, AgorError> {
        Self::terminal_guard(ctx)?;
        let terminals = self.state.terminals.terminals.lock();
        Ok(terminals
            .values()
            .map(|t| {
                json!({
                    "terminal_id": t.terminal_id,
                    "user_id": t.user_id,
                    "worktree_id": t.worktree_id,
                    "session_name": t.session_name,
                })
            })
            .collect())
    }

    async fn call(
        &self,
        ctx: &CallCtx,
        route: &str,
        id: Option<&str>,
        params: Value,
    ) -> Result<Value, AgorError> {
        Self::terminal_guard(ctx)?;
        match route {
            // Executor registers the PTY it is about to spawn.
            "register" => {
                let user_id = params
                    .get("user_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AgorError::validation("user_id is required"))?;
                let worktree_id = params
                    .get("worktree_id")
                    .and_then(Value::as_str)
                    .map(WorktreeId::from_string);
                let session_name = params
                    .get("session_name")
                    .and_then(Value::as_str)
                    .unwrap_or("agor")
                    .to_string();
                let seq = self
                    .state
                    .terminals
                    .next_id
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let terminal_id = format!("{}-{seq}", agor_core::short_id(user_id));
                let entry = TerminalEntry {
                    terminal_id: terminal_id.clone(),
                    user_id: UserId::from_string(user_id),
                    worktree_id,
                    session_name,
                };
                self.state.terminals.terminals.lock().insert(terminal_id.clone(), entry);
                info!(%terminal_id, "terminal registered");
                Ok(json!({"terminal_id": terminal_id}))
            }
            // Executor → subscribers: PTY output.
            "output" => {
                let terminal_id = id.ok_or_else(|| AgorError::validation("output requires an id"))?;
                let data = params
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.entry(terminal_id)?;
                self.state.hub.broadcast(Event::TerminalOutput {
                    terminal_id: terminal_id.to_string(),
                    data,
                });
                Ok(json!({"accepted": true}))
            }
            // Client → executor: keystrokes (and resize), relayed over
            // the terminal channel the executor subscribed to.
            "input" => {
                let terminal_id = id.ok_or_else(|| AgorError::validation("input requires an id"))?;
                self.entry(terminal_id)?;
                let data = params
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.state.hub.broadcast(Event::TerminalInput {
                    terminal_id: terminal_id.to_string(),
                    data,
                });
                Ok(json!({"accepted": true}))
            }
            "resize" => {
                let terminal_id =
                    id.ok_or_else(|| AgorError::validation("resize requires an id"))?;
                self.entry(terminal_id)?;
                let cols = params.get("cols").and_then(Value::as_u64).unwrap_or(80) as u16;
                let rows = params.get("rows").and_then(Value::as_u64).unwrap_or(24) as u16;
                self.state.hub.broadcast(Event::TerminalResize {
                    terminal_id: terminal_id.to_string(),
                    cols,
                    rows,
                });
                Ok(json!({"accepted": true}))
            }
            "closed" => {
                let terminal_id =
                    id.ok_or_else(|| AgorError::validation("closed requires an id"))?;
                self.state.terminals.terminals.lock().remove(terminal_id);
                self.state.hub.broadcast(Event::TerminalClosed {
                    terminal_id: terminal_id.to_string(),
                });
                Ok(json!({"closed": true}))
            }
            // SSH endpoint registration + lookup for `agor worktree ssh`.
            "ssh-register" => {
                let worktree_id = params
                    .get("worktree_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AgorError::validation("worktree_id is required"))?;
                let worktree: agor_core::Worktree = self.state.store.get(worktree_id)?;
                let (ssh_port, _) = self.state.engine.worktree_ports(&worktree);
                let endpoint = SshEndpoint {
                    worktree_id: worktree.worktree_id.clone(),
                    host: params
                        .get("host")
                        .and_then(Value::as_str)
                        .unwrap_or("127.0.0.1")
                        .to_string(),
                    port: params
                        .get("port")
                        .and_then(Value::as_u64)
                        .map(|p| p as u16)
                        .unwrap_or(ssh_port),
                };
                self.state
                    .terminals
                    .ssh
                    .lock()
                    .insert(worktree.worktree_id.to_string(), endpoint.clone());
                serde_json::to_value(endpoint)
                    .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
            }
            "ssh-info" => {
                let worktree_id =
                    id.ok_or_else(|| AgorError::validation("ssh-info requires a worktree id"))?;
                let key = self.state.store.resolve_id::<agor_core::Worktree>(worktree_id)?;
                let registered = self.state.terminals.ssh.lock().get(&key).cloned();
                let endpoint = match registered {
                    Some(endpoint) => endpoint,
                    None => {
                        let worktree: agor_core::Worktree = self.state.store.get(&key)?;
                        let (ssh_port, _) = self.state.engine.worktree_ports(&worktree);
                        SshEndpoint {
                            worktree_id: worktree.worktree_id,
                            host: "127.0.0.1".into(),
                            port: ssh_port,
                        }
                    }
                };
                // Codespace port forwarding rewrites the public host.
                let public_host = crate::env::codespace_host(endpoint.port);
                Ok(json!({
                    "worktree_id": endpoint.worktree_id,
                    "host": endpoint.host,
                    "port": endpoint.port,
                    "public_host": public_host,
                }))
            }
            other => Err(AgorError::not_found(format!("terminals route {other:?}"))),
        }
    }
}
