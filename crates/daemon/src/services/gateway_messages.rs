// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway services: channel bindings CRUD and the inbound post route.

use super::{CallCtx, Service};
use crate::auth::AuthService;
use crate::hooks::{require_authenticated, require_role, HookSet};
use crate::state::AppState;
use agor_core::{
    AgorError, ChannelId, Clock, ErrorKind, GatewayChannel, Role, ThreadSessionMap, UserId,
    WorktreeId,
};
use agor_wire::{FindQuery, PostMessage};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// CRUD over gateway channel bindings (`gateway-channels`).
pub struct GatewayChannelsService<C: Clock + 'static> {
    state: Arc<AppState<C>>,
}

impl<C: Clock + 'static> GatewayChannelsService<C> {
    pub fn new(state: Arc<AppState<C>>) -> Arc<Self> {
        Arc::new(Self { state })
    }

    fn to_value(channel: GatewayChannel) -> Result<Value, AgorError> {
        serde_json::to_value(channel)
            .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
    }
}

#[async_trait]
impl<C: Clock + 'static> Service<C> for GatewayChannelsService<C> {
    fn name(&self) -> &'static str {
        "gateway-channels"
    }

    fn hooks(&self) -> HookSet {
        HookSet::new().before(require_authenticated()).before(require_role(Role::Admin))
    }

    async fn find(&self, _ctx: &CallCtx, query: FindQuery) -> Result<Vec<Value>, AgorError> {
        Ok(query.apply(self.state.store.all_raw(agor_storage::Table::GatewayChannels)))
    }

    async fn get(&self, _ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        Self::to_value(self.state.store.get::<GatewayChannel>(id)?)
    }

    async fn create(&self, _ctx: &CallCtx, data: Value) -> Result<Value, AgorError> {
        let channel_type = data
            .get("channel_type")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("channel_type is required"))?
            .to_string();
        let channel_key = data
            .get("channel_key")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("channel_key is required"))?;
        let agor_user_id = data
            .get("agor_user_id")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("agor_user_id is required"))?;
        let owner = self.state.store.resolve_id::<agor_core::User>(agor_user_id)?;
        let worktree_id = data
            .get("target_worktree_id")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("target_worktree_id is required"))?;
        let worktree = self.state.store.resolve_id::<agor_core::Worktree>(worktree_id)?;

        let now = self.state.store.clock().utc_now();
        let channel = GatewayChannel {
            channel_id: ChannelId::new(),
            channel_type,
            // Only the fingerprint is stored.
            channel_key_hash: AuthService::fingerprint(channel_key),
            agor_user_id: UserId::from_string(owner),
            target_worktree_id: WorktreeId::from_string(worktree),
            enabled: data.get("enabled").and_then(Value::as_bool).unwrap_or(true),
            config: data.get("config").cloned(),
            agentic_config: data.get("agentic_config").cloned(),
            last_message_at: None,
            created_at: now,
            updated_at: now,
        };
        let channel = self.state.store.create(channel)?;

        crate::gateway::refresh_active_flag(&self.state);
        if channel.wants_push_listener() {
            crate::gateway::start_push_listeners(&self.state).await;
        }
        Self::to_value(channel)
    }

    async fn patch(&self, _ctx: &CallCtx, id: &str, data: Value) -> Result<Value, AgorError> {
        let mut data = data;
        if let Some(obj) = data.as_object_mut() {
            // Key rotation comes in as plaintext, lands as a hash.
            if let Some(key) = obj.remove("channel_key").as_ref().and_then(Value::as_str) {
                obj.insert("channel_key_hash".into(), json!(AuthService::fingerprint(key)));
            }
        }
        let before: GatewayChannel = self.state.store.get(id)?;
        let after: GatewayChannel = self.state.store.patch(id, data)?;

        crate::gateway::refresh_active_flag(&self.state);
        if before.enabled && !after.enabled {
            crate::gateway::stop_push_listener(&self.state, &after).await;
        } else if after.wants_push_listener() {
            crate::gateway::start_push_listeners(&self.state).await;
        }
        Self::to_value(after)
    }

    async fn remove(&self, _ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        let channel: GatewayChannel = self.state.store.remove(id)?;
        crate::gateway::stop_push_listener(&self.state, &channel).await;
        crate::gateway::refresh_active_flag(&self.state);
        // Orphaned thread mappings go with the channel.
        for mapping in self.state.store.all::<ThreadSessionMap>() {
            if mapping.channel_id == channel.channel_id {
                let _ = self.state.store.remove::<ThreadSessionMap>(&ThreadSessionMap::key(
                    &mapping.channel_id,
                    &mapping.thread_id,
                ));
            }
        }
        Self::to_value(channel)
    }
}

/// The inbound post route (`gateway-messages.create`). No auth hooks:
/// the channel key in the payload is the authenticator.
pub struct GatewayMessagesService<C: Clock + 'static> {
    state: Arc<AppState<C>>,
}

impl<C: Clock + 'static> GatewayMessagesService<C> {
    pub fn new(state: Arc<AppState<C>>) -> Arc<Self> {
        Arc::new(Self { state })
    }
}

#[async_trait]
impl<C: Clock + 'static> Service<C> for GatewayMessagesService<C> {
    fn name(&self) -> &'static str {
        "gateway-messages"
    }

    fn quiet(&self) -> bool {
        true
    }

    async fn create(&self, _ctx: &CallCtx, data: Value) -> Result<Value, AgorError> {
        let post: PostMessage = serde_json::from_value(data)
            .map_err(|e| AgorError::validation(format!("invalid post: {e}")))?;
        crate::gateway::handle_inbound(&self.state, post).await
    }
}
