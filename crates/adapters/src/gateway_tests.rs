// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn fake_connector_records_sends() {
    let connector = FakeConnector::new("slack");
    connector
        .send_message(OutboundMessage {
            thread_id: "T-1".into(),
            text: "hello".into(),
            metadata: None,
        })
        .await
        .unwrap();
    assert_eq!(connector.sent_texts(), vec!["hello"]);
}

#[tokio::test]
async fn push_listener_lifecycle() {
    let connector = FakeConnector::new("slack");
    assert!(!connector.is_listening());

    let received = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = received.clone();
    connector
        .start_listening(Arc::new(move |post| sink.lock().push(post.text)))
        .await
        .unwrap();
    assert!(connector.is_listening());

    connector.inject(InboundPost { thread_id: "T-1".into(), text: "hi".into(), metadata: None });
    assert_eq!(received.lock().clone(), vec!["hi"]);

    connector.stop_listening().await;
    assert!(!connector.is_listening());
    connector.inject(InboundPost { thread_id: "T-1".into(), text: "late".into(), metadata: None });
    assert_eq!(received.lock().len(), 1);
}

#[test]
fn default_formatting_prefers_text_field() {
    struct Bare;
    #[async_trait::async_trait]
    impl GatewayConnector for Bare {
        fn channel_type(&self) -> &str {
            "bare"
        }
        async fn send_message(
            &self,
            _message: OutboundMessage,
        ) -> Result<(), GatewayConnectorError> {
            Ok(())
        }
    }

    let connector = Bare;
    assert_eq!(connector.format_message(&json!({"text": "plain"})), "plain");
    assert_eq!(connector.format_message(&json!({"n": 1})), r#"{"n":1}"#);
}
