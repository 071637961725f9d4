// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The gateway router: external chat threads ↔ sessions.
//!
//! Inbound posts authenticate with a channel key, map onto sessions via
//! the thread mapping, and dispatch internal prompts. Outbound routing
//! takes a fast path when no channel is active. Push-mode listeners are
//! started for enabled channels carrying an app token.

use crate::services::Principal;
use crate::state::AppState;
use agor_adapters::{GatewayConnector, InboundPost};
use agor_core::{
    AgorError, ChannelId, Clock, ErrorKind, GatewayChannel, SessionId, ThreadSessionMap,
    ThreadStatus, User,
};
use agor_wire::PostMessage;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Connector registry + router fast-path state.
#[derive(Default)]
pub struct GatewayState {
    connectors: RwLock<HashMap<String, Arc<dyn GatewayConnector>>>,
    has_active_channels: AtomicBool,
    /// Channel ids with a live push listener.
    listening: Mutex<HashSet<String>>,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<(ChannelId, InboundPost)>>>,
}

impl GatewayState {
    pub fn register_connector(&self, connector: Arc<dyn GatewayConnector>) {
        self.connectors.write().insert(connector.channel_type().to_string(), connector);
    }

    pub fn connector(&self, channel_type: &str) -> Option<Arc<dyn GatewayConnector>> {
        self.connectors.read().get(channel_type).cloned()
    }

    pub fn has_active_channels(&self) -> bool {
        self.has_active_channels.load(Ordering::SeqCst)
    }

    pub fn listening_count(&self) -> usize {
        self.listening.lock().len()
    }
}

/// Recompute the outbound fast-path flag (startup + channel mutation).
pub fn refresh_active_flag<C: Clock + 'static>(state: &AppState<C>) {
    let active = state.store.all::<GatewayChannel>().iter().any(|c| c.enabled);
    state.gateway.has_active_channels.store(active, Ordering::SeqCst);
}

/// Authenticate and dispatch one inbound post (the C9 inbound flow).
pub async fn handle_inbound<C: Clock + 'static>(
    state: &Arc<AppState<C>>,
    post: PostMessage,
) -> Result<Value, AgorError> {
    let fingerprint = crate::auth::AuthService::fingerprint(&post.channel_key);
    let channel = state
        .store
        .all::<GatewayChannel>()
        .into_iter()
        .find(|c| c.channel_key_hash == fingerprint)
        .ok_or_else(|| {
            AgorError::new(ErrorKind::NotAuthenticated, "unknown gateway channel key")
        })?;
    if !channel.enabled {
        return Err(AgorError::forbidden("gateway channel is disabled"));
    }
    dispatch_inbound(state, &channel, &post.thread_id, &post.text, post.metadata.as_ref()).await
}

/// Mapping resolution + session creation + internal prompt dispatch.
async fn dispatch_inbound<C: Clock + 'static>(
    state: &Arc<AppState<C>>,
    channel: &GatewayChannel,
    thread_id: &str,
    text: &str,
    metadata: Option<&Value>,
) -> Result<Value, AgorError> {
    let mapping_key = ThreadSessionMap::key(&channel.channel_id, thread_id);
    let existing = state.store.maybe_get::<ThreadSessionMap>(&mapping_key);

    // A reply in a random thread must not create a session drive-by.
    let requires_verification = metadata
        .and_then(|m| m.get("requires_mapping_verification"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if existing.is_none() && requires_verification {
        debug!(thread = thread_id, "unmapped thread requires verification; refusing");
        // Post an advisory back so the thread knows why nothing happened.
        if let Some(connector) = state.gateway.connector(&channel.channel_type) {
            let _ = connector
                .send_message(agor_adapters::OutboundMessage {
                    thread_id: thread_id.to_string(),
                    text: "This thread is not linked to an agent session; mention the bot to start one.".into(),
                    metadata: Some(json!({"system": true})),
                })
                .await;
        }
        return Ok(json!({
            "success": false,
            "created": false,
            "reason": "thread is not mapped to a session; mention the bot to start one",
        }));
    }

    let owner: User = state.store.get(channel.agor_user_id.as_str())?;
    let (session_id, created) = match existing {
        Some(mapping) => (mapping.session_id, false),
        None => {
            let session = state
                .registry()
                .internal_call(
                    &state.hub,
                    Some(owner.clone()),
                    "sessions",
                    "create-internal",
                    None,
                    json!({
                        "worktree_id": channel.target_worktree_id,
                        "agentic_tool": channel
                            .agentic_config
                            .as_ref()
                            .and_then(|c| c.get("tool"))
                            .cloned()
                            .unwrap_or_else(|| json!("claude-code")),
                        "created_by": owner.user_id,
                        "custom_context": {
                            "gateway_source": {
                                "channel_id": channel.channel_id,
                                "channel_type": channel.channel_type,
                                "thread_id": thread_id,
                            }
                        },
                    }),
                )
                .await?;
            let session_id = SessionId::from_string(
                session
                    .get("session_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AgorError::validation("session create returned no id"))?,
            );
            let mapping = ThreadSessionMap {
                channel_id: channel.channel_id.clone(),
                thread_id: thread_id.to_string(),
                session_id: session_id.clone(),
                status: ThreadStatus::Active,
                last_message_at: Some(state.store.clock().utc_now()),
                created_at: state.store.clock().utc_now(),
            };
            state.store.create(mapping)?;
            info!(%session_id, thread = thread_id, "gateway thread mapped to new session");
            (session_id, true)
        }
    };

    // Internal dispatch: no provider, auth hooks bypassed, the channel
    // owner attached explicitly.
    let task = state
        .registry()
        .internal_call(
            &state.hub,
            Some(owner),
            "sessions",
            "prompt",
            Some(session_id.as_str()),
            json!({"prompt": text}),
        )
        .await?;

    touch_channel(state, channel, &mapping_key);
    Ok(json!({
        "success": true,
        "created": created,
        "session_id": session_id,
        "task_id": task.get("task_id").cloned().unwrap_or(Value::Null),
    }))
}

fn touch_channel<C: Clock + 'static>(
    state: &Arc<AppState<C>>,
    channel: &GatewayChannel,
    mapping_key: &str,
) {
    let now = state.store.clock().utc_now();
    let _ = state
        .store
        .patch::<GatewayChannel>(channel.channel_id.as_str(), json!({"last_message_at": now}));
    if let Ok(now_value) = serde_json::to_value(now) {
        let _ = state
            .store
            .patch::<ThreadSessionMap>(mapping_key, json!({"last_message_at": now_value}));
    }
}

/// Outbound routing: session → platform thread. Returns whether the
/// message was routed.
pub async fn route_message<C: Clock + 'static>(
    state: &Arc<AppState<C>>,
    session_id: &SessionId,
    text: &str,
) -> Result<bool, AgorError> {
    // Fast path: refreshed at startup and on channel mutation.
    if !state.gateway.has_active_channels() {
        return Ok(false);
    }
    let mapping = state
        .store
        .all::<ThreadSessionMap>()
        .into_iter()
        .find(|m| &m.session_id == session_id);
    let Some(mapping) = mapping else {
        return Ok(false);
    };
    let Some(channel) = state.store.maybe_get::<GatewayChannel>(mapping.channel_id.as_str())
    else {
        return Ok(false);
    };
    if !channel.enabled {
        return Ok(false);
    }
    let Some(connector) = state.gateway.connector(&channel.channel_type) else {
        debug!(channel_type = %channel.channel_type, "no connector registered");
        return Ok(false);
    };

    connector
        .send_message(agor_adapters::OutboundMessage {
            thread_id: mapping.thread_id.clone(),
            text: text.to_string(),
            metadata: None,
        })
        .await
        .map_err(|e| AgorError::new(ErrorKind::NetworkError, e.to_string()))?;

    touch_channel(state, &channel, &ThreadSessionMap::key(&mapping.channel_id, &mapping.thread_id));
    Ok(true)
}

/// Start push-mode listeners for all eligible channels (daemon boot and
/// channel enable). Idempotent per channel.
pub async fn start_push_listeners<C: Clock + 'static>(state: &Arc<AppState<C>>) {
    // One shared intake loop turns sync connector callbacks into
    // internal dispatches.
    let tx = {
        let mut slot = state.gateway.inbound_tx.lock();
        if slot.is_none() {
            let (tx, mut rx) = mpsc::unbounded_channel::<(ChannelId, InboundPost)>();
            let intake_state = state.clone();
            tokio::spawn(async move {
                while let Some((channel_id, post)) = rx.recv().await {
                    let Some(channel) = intake_state
                        .store
                        .maybe_get::<GatewayChannel>(channel_id.as_str())
                    else {
                        continue;
                    };
                    let result = dispatch_inbound(
                        &intake_state,
                        &channel,
                        &post.thread_id,
                        &post.text,
                        post.metadata.as_ref(),
                    )
                    .await;
                    if let Err(e) = result {
                        warn!(channel = %channel_id, error = %e, "push inbound dispatch failed");
                    }
                }
            });
            *slot = Some(tx);
        }
        slot.clone()
    };
    let Some(tx) = tx else { return };

    for channel in state.store.all::<GatewayChannel>() {
        if !channel.wants_push_listener() {
            continue;
        }
        if state.gateway.listening.lock().contains(channel.channel_id.as_str()) {
            continue;
        }
        let Some(connector) = state.gateway.connector(&channel.channel_type) else {
            debug!(channel_type = %channel.channel_type, "push channel without connector");
            continue;
        };
        let channel_id = channel.channel_id.clone();
        let sender = tx.clone();
        let callback: agor_adapters::InboundCallback = Arc::new(move |post| {
            let _ = sender.send((channel_id.clone(), post));
        });
        match connector.start_listening(callback).await {
            Ok(()) => {
                info!(channel = %channel.channel_id, "push listener started");
                state.gateway.listening.lock().insert(channel.channel_id.to_string());
            }
            Err(e) => warn!(channel = %channel.channel_id, error = %e, "push listener failed"),
        }
    }
}

/// Stop one channel's listener (disable/delete).
pub async fn stop_push_listener<C: Clock + 'static>(state: &AppState<C>, channel: &GatewayChannel) {
    if state.gateway.listening.lock().remove(channel.channel_id.as_str()) {
        if let Some(connector) = state.gateway.connector(&channel.channel_type) {
            connector.stop_listening().await;
        }
        info!(channel = %channel.channel_id, "push listener stopped");
    }
}

/// Daemon shutdown: stop everything.
pub async fn stop_all_listeners<C: Clock + 'static>(state: &AppState<C>) {
    let ids: Vec<String> = state.gateway.listening.lock().drain().collect();
    for id in ids {
        if let Some(channel) = state.store.maybe_get::<GatewayChannel>(&id) {
            if let Some(connector) = state.gateway.connector(&channel.channel_type) {
                connector.stop_listening().await;
            }
        }
    }
}

/// Internal principal carrying no user — used where the executor path
/// needs a service call that checks nothing.
pub fn internal_principal() -> Principal {
    Principal::Internal { user: None }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
