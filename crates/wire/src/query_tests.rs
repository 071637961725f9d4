// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use agor_core::ErrorKind;
use serde_json::json;

#[test]
fn null_query_is_empty() {
    let q = FindQuery::validate(&Value::Null).unwrap();
    assert_eq!(q, FindQuery::default());
}

#[test]
fn operators_parse_with_coercion() {
    let q = FindQuery::validate(&json!({
        "$limit": "25",
        "$skip": 5,
        "$sort": {"created_at": "-1"},
        "$select": ["session_id", "status"],
        "archived": "false",
    }))
    .unwrap();

    assert_eq!(q.limit, Some(25));
    assert_eq!(q.skip, 5);
    assert_eq!(q.sort.get("created_at"), Some(&SortDirection::Descending));
    assert_eq!(q.select.as_deref(), Some(&["session_id".to_string(), "status".to_string()][..]));
    assert_eq!(q.filters.get("archived"), Some(&Value::Bool(false)));
}

#[test]
fn unknown_operator_is_rejected() {
    let err = FindQuery::validate(&json!({"$where": "1 == 1"})).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ValidationFailed);
    assert!(err.message.contains("$where"));
}

#[test]
fn limit_is_clamped_to_ceiling() {
    let q = FindQuery::validate(&json!({"$limit": 999_999})).unwrap();
    assert_eq!(q.limit, Some(MAX_QUERY_LIMIT));
}

#[test]
fn sort_value_other_than_unit_is_rejected() {
    let err = FindQuery::validate(&json!({"$sort": {"name": 2}})).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ValidationFailed);
}

#[test]
fn non_object_query_is_rejected() {
    let err = FindQuery::validate(&json!([1, 2, 3])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ValidationFailed);
    assert!(err.message.contains("array"));
}

#[test]
fn numeric_filter_strings_are_coerced() {
    let q = FindQuery::validate(&json!({"worktree_unique_id": "42"})).unwrap();
    assert_eq!(q.filters.get("worktree_unique_id"), Some(&json!(42)));
}

#[test]
fn apply_filters_sorts_and_pages() {
    let rows = vec![
        json!({"name": "c", "n": 3, "keep": true}),
        json!({"name": "a", "n": 1, "keep": true}),
        json!({"name": "b", "n": 2, "keep": false}),
        json!({"name": "d", "n": 4, "keep": true}),
    ];
    let q = FindQuery::validate(&json!({
        "keep": true,
        "$sort": {"n": 1},
        "$skip": 1,
        "$limit": 1,
    }))
    .unwrap();

    let out = q.apply(rows);
    assert_eq!(out, vec![json!({"name": "c", "n": 3, "keep": true})]);
}

#[test]
fn apply_select_projects_fields() {
    let rows = vec![json!({"a": 1, "b": 2, "c": 3})];
    let q = FindQuery::validate(&json!({"$select": ["a", "c"]})).unwrap();
    assert_eq!(q.apply(rows), vec![json!({"a": 1, "c": 3})]);
}

#[test]
fn multi_field_sort_applies_in_order() {
    let rows = vec![
        json!({"g": 1, "n": 2}),
        json!({"g": 0, "n": 9}),
        json!({"g": 1, "n": 1}),
    ];
    let q = FindQuery::validate(&json!({"$sort": {"g": 1, "n": 1}})).unwrap();
    let out = q.apply(rows);
    assert_eq!(out[0], json!({"g": 0, "n": 9}));
    assert_eq!(out[1], json!({"g": 1, "n": 1}));
    assert_eq!(out[2], json!({"g": 1, "n": 2}));
}
