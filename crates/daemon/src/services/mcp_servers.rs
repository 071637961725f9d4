// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MCP servers: registration and session attachment.

use super::{CallCtx, Service};
use crate::hooks::{admin_writes, require_authenticated, HookSet};
use crate::state::AppState;
use agor_core::{
    AgorError, Clock, ErrorKind, McpServer, McpServerId, McpTransport, SessionId, SessionMcpServer,
};
use agor_wire::FindQuery;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct McpServersService<C: Clock + 'static> {
    state: Arc<AppState<C>>,
}

impl<C: Clock + 'static> McpServersService<C> {
    pub fn new(state: Arc<AppState<C>>) -> Arc<Self> {
        Arc::new(Self { state })
    }

    fn to_value(server: McpServer) -> Result<Value, AgorError> {
        serde_json::to_value(server)
            .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
    }
}

#[async_trait]
impl<C: Clock + 'static> Service<C> for McpServersService<C> {
    fn name(&self) -> &'static str {
        "mcp-servers"
    }

    fn hooks(&self) -> HookSet {
        HookSet::new().before(require_authenticated()).before(admin_writes())
    }

    async fn find(&self, _ctx: &CallCtx, query: FindQuery) -> Result<Vec<Value>, AgorError> {
        Ok(query.apply(self.state.store.all_raw(agor_storage::Table::McpServers)))
    }

    async fn get(&self, _ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        Self::to_value(self.state.store.get::<McpServer>(id)?)
    }

    async fn create(&self, ctx: &CallCtx, data: Value) -> Result<Value, AgorError> {
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("name is required"))?;
        let transport: McpTransport =
            serde_json::from_value(data.get("transport").cloned().unwrap_or(json!("stdio")))
                .map_err(|_| AgorError::validation("invalid transport"))?;
        let target = data
            .get("target")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("target is required"))?;
        let env = match data.get("env") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| AgorError::validation(format!("invalid env: {e}")))?,
            None => Default::default(),
        };

        let now = self.state.store.clock().utc_now();
        let server = McpServer {
            mcp_server_id: McpServerId::new(),
            name: name.to_string(),
            transport,
            target: target.to_string(),
            env,
            created_by: ctx.principal.user().map(|u| u.user_id.clone()),
            created_at: now,
            updated_at: now,
        };
        Self::to_value(self.state.store.create(server)?)
    }

    async fn patch(&self, _ctx: &CallCtx, id: &str, data: Value) -> Result<Value, AgorError> {
        Self::to_value(self.state.store.patch::<McpServer>(id, data)?)
    }

    async fn remove(&self, _ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        let server: McpServer = self.state.store.remove(id)?;
        // Detach from any sessions still pointing at it.
        for attachment in self.state.store.all::<SessionMcpServer>() {
            if attachment.mcp_server_id == server.mcp_server_id {
                let _ = self.state.store.remove::<SessionMcpServer>(&SessionMcpServer::key(
                    &attachment.session_id,
                    &attachment.mcp_server_id,
                ));
            }
        }
        Self::to_value(server)
    }

    async fn call(
        &self,
        _ctx: &CallCtx,
        route: &str,
        id: Option<&str>,
        params: Value,
    ) -> Result<Value, AgorError> {
        let id = id.ok_or_else(|| AgorError::validation(format!("{route} requires an id")))?;
        match route {
            "attach" => {
                let server: McpServer = self.state.store.get(id)?;
                let session_id = params
                    .get("session_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AgorError::validation("session_id is required"))?;
                let session_key = self.state.store.resolve_id::<agor_core::Session>(session_id)?;
                let attachment = SessionMcpServer {
                    session_id: SessionId::from_string(session_key),
                    mcp_server_id: server.mcp_server_id.clone(),
                    enabled: true,
                    created_at: self.state.store.clock().utc_now(),
                };
                self.state.store.create(attachment)?;
                Ok(json!({"attached": true}))
            }
            "detach" => {
                let server: McpServer = self.state.store.get(id)?;
                let session_id = params
                    .get("session_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AgorError::validation("session_id is required"))?;
                let session_key = self.state.store.resolve_id::<agor_core::Session>(session_id)?;
                let key = SessionMcpServer::key(
                    &SessionId::from_string(session_key),
                    &server.mcp_server_id,
                );
                self.state.store.remove::<SessionMcpServer>(&key)?;
                Ok(json!({"detached": true}))
            }
            other => Err(AgorError::not_found(format!("mcp-servers route {other:?}"))),
        }
    }
}
