// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn requests_serialize_with_type_tag() {
    let req = Request::Find { service: "sessions".into(), query: json!({"archived": false}) };
    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(value["type"], "Find");
    assert_eq!(value["service"], "sessions");
}

#[test]
fn call_omits_empty_id() {
    let req = Request::Call {
        service: "messages".into(),
        route: "streaming".into(),
        id: None,
        params: json!({}),
    };
    let value = serde_json::to_value(&req).unwrap();
    assert!(value.get("id").is_none());
}

#[test]
fn hello_token_round_trips() {
    let req = Request::Hello { version: "0.2.0".into(), token: Some("jwt".into()) };
    let json = serde_json::to_string(&req).unwrap();
    let parsed: Request = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, req);
}

#[test]
fn find_query_defaults_to_null() {
    let parsed: Request =
        serde_json::from_str(r#"{"type": "Find", "service": "repos"}"#).unwrap();
    assert_eq!(parsed, Request::Find { service: "repos".into(), query: serde_json::Value::Null });
}
