// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use agor_core::test_support::UserBuilder;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

fn ctx_parts() -> (Principal, Value) {
    (Principal::User(UserBuilder::default().role(Role::Member).build()), json!({"a": 1}))
}

#[test]
fn before_hooks_run_in_order_and_mutate_params() {
    let (principal, mut params) = ctx_parts();
    let hooks = HookSet::new()
        .before(Arc::new(|ctx| {
            ctx.params["step"] = json!(["one"]);
            Ok(())
        }))
        .before(Arc::new(|ctx| {
            if let Some(steps) = ctx.params["step"].as_array_mut() {
                steps.push(json!("two"));
            }
            Ok(())
        }));

    let method = Method::Create;
    let mut ctx = HookContext {
        service: "repos",
        method: &method,
        principal: &principal,
        id: None,
        params: &mut params,
        result: None,
    };
    hooks.run_before(&mut ctx).unwrap();
    assert_eq!(params["step"], json!(["one", "two"]));
}

#[test]
fn failing_before_hook_short_circuits() {
    let (principal, mut params) = ctx_parts();
    let later = Arc::new(AtomicUsize::new(0));
    let later_in_hook = later.clone();
    let hooks = HookSet::new()
        .before(Arc::new(|_| Err(AgorError::forbidden("nope"))))
        .before(Arc::new(move |_| {
            later_in_hook.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

    let method = Method::Create;
    let mut ctx = HookContext {
        service: "repos",
        method: &method,
        principal: &principal,
        id: None,
        params: &mut params,
        result: None,
    };
    let err = hooks.run_before(&mut ctx).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
    assert_eq!(later.load(Ordering::SeqCst), 0);
}

#[test]
fn error_hooks_observe_failures() {
    let (principal, mut params) = ctx_parts();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_hook = seen.clone();
    let hooks = HookSet::new().on_error(Arc::new(move |_, _| {
        seen_in_hook.fetch_add(1, Ordering::SeqCst);
    }));

    let method = Method::Remove;
    let ctx = HookContext {
        service: "repos",
        method: &method,
        principal: &principal,
        id: Some("r-1"),
        params: &mut params,
        result: None,
    };
    hooks.run_error(&ctx, &AgorError::not_found("repo"));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn role_guard_enforces_ordering() {
    let admin = Principal::User(UserBuilder::default().role(Role::Admin).build());
    let viewer = Principal::User(UserBuilder::default().role(Role::Viewer).build());
    let guard = require_role(Role::Admin);

    let method = Method::Custom("prompt".into());
    let mut params = json!({});
    let mut ctx = HookContext {
        service: "terminals",
        method: &method,
        principal: &admin,
        id: None,
        params: &mut params,
        result: None,
    };
    assert!(guard(&mut ctx).is_ok());

    let mut params = json!({});
    let mut ctx = HookContext {
        service: "terminals",
        method: &method,
        principal: &viewer,
        id: None,
        params: &mut params,
        result: None,
    };
    assert_eq!(guard(&mut ctx).unwrap_err().kind, ErrorKind::Forbidden);
}

#[test]
fn admin_writes_leaves_reads_open() {
    let viewer = Principal::User(UserBuilder::default().role(Role::Viewer).build());
    let guard = admin_writes();

    let read = Method::Find;
    let mut params = json!({});
    let mut ctx = HookContext {
        service: "repos",
        method: &read,
        principal: &viewer,
        id: None,
        params: &mut params,
        result: None,
    };
    assert!(guard(&mut ctx).is_ok());

    let write = Method::Create;
    let mut params = json!({});
    let mut ctx = HookContext {
        service: "repos",
        method: &write,
        principal: &viewer,
        id: None,
        params: &mut params,
        result: None,
    };
    assert!(guard(&mut ctx).is_err());
}

#[test]
fn internal_principal_bypasses_auth_guards() {
    let internal = Principal::Internal { user: None };
    let guard = require_role(Role::Owner);
    let method = Method::Create;
    let mut params = json!({});
    let mut ctx = HookContext {
        service: "sessions",
        method: &method,
        principal: &internal,
        id: None,
        params: &mut params,
        result: None,
    };
    assert!(guard(&mut ctx).is_ok());
}

#[test]
fn anonymous_fails_authentication() {
    let guard = require_authenticated();
    let method = Method::Get;
    let mut params = json!({});
    let anon = Principal::Anonymous;
    let mut ctx = HookContext {
        service: "sessions",
        method: &method,
        principal: &anon,
        id: Some("s-1"),
        params: &mut params,
        result: None,
    };
    assert_eq!(guard(&mut ctx).unwrap_err().kind, ErrorKind::NotAuthenticated);
}
