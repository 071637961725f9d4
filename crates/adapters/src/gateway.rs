// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway connector contract.
//!
//! Concrete chat-platform connectors (Slack, Telegram, ...) live outside
//! this tree; the daemon drives them only through this trait. Push-mode
//! connectors deliver inbound posts through the registered callback.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// A message routed out to a platform thread.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub thread_id: String,
    pub text: String,
    pub metadata: Option<Value>,
}

/// An inbound post delivered by a push-mode listener.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundPost {
    pub thread_id: String,
    pub text: String,
    pub metadata: Option<Value>,
}

/// Callback invoked by push-mode listeners for each inbound post.
pub type InboundCallback = Arc<dyn Fn(InboundPost) + Send + Sync>;

#[derive(Debug, Error)]
pub enum GatewayConnectorError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("connector does not support push-mode listening")]
    ListeningUnsupported,
}

#[async_trait]
pub trait GatewayConnector: Send + Sync {
    /// Platform discriminator matching `GatewayChannel.channel_type`.
    fn channel_type(&self) -> &str;

    async fn send_message(&self, message: OutboundMessage) -> Result<(), GatewayConnectorError>;

    /// Render a raw agent message into platform text. Default: the raw
    /// JSON's `text` field, else its compact serialization.
    fn format_message(&self, raw: &Value) -> String {
        raw.get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| raw.to_string())
    }

    /// Begin push-mode listening (connectors with an app token).
    async fn start_listening(
        &self,
        _callback: InboundCallback,
    ) -> Result<(), GatewayConnectorError> {
        Err(GatewayConnectorError::ListeningUnsupported)
    }

    async fn stop_listening(&self) {}
}

/// Recording connector for router tests; supports manual inbound injection.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeConnector {
    channel_type: String,
    pub sent: parking_lot::Mutex<Vec<OutboundMessage>>,
    listener: parking_lot::Mutex<Option<InboundCallback>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeConnector {
    pub fn new(channel_type: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            channel_type: channel_type.into(),
            sent: parking_lot::Mutex::new(Vec::new()),
            listener: parking_lot::Mutex::new(None),
        })
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.text.clone()).collect()
    }

    pub fn is_listening(&self) -> bool {
        self.listener.lock().is_some()
    }

    /// Simulate an inbound platform post.
    pub fn inject(&self, post: InboundPost) {
        if let Some(callback) = self.listener.lock().clone() {
            callback(post);
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl GatewayConnector for FakeConnector {
    fn channel_type(&self) -> &str {
        &self.channel_type
    }

    async fn send_message(&self, message: OutboundMessage) -> Result<(), GatewayConnectorError> {
        self.sent.lock().push(message);
        Ok(())
    }

    async fn start_listening(&self, callback: InboundCallback) -> Result<(), GatewayConnectorError> {
        *self.listener.lock() = Some(callback);
        Ok(())
    }

    async fn stop_listening(&self) {
        *self.listener.lock() = None;
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
