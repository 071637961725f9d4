// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};

#[tokio::test]
async fn gate_serializes_critical_sections() {
    let gates = Arc::new(SessionGates::default());
    let session = SessionId::new();
    let in_section = Arc::new(AtomicU32::new(0));
    let max_seen = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let gates = gates.clone();
        let session = session.clone();
        let in_section = in_section.clone();
        let max_seen = max_seen.clone();
        handles.push(tokio::spawn(async move {
            let _guard = gates.lock(&session).await;
            let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            in_section.fetch_sub(1, Ordering::SeqCst);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn different_sessions_do_not_contend() {
    let gates = SessionGates::default();
    let a = SessionId::new();
    let b = SessionId::new();

    let _guard_a = gates.lock(&a).await;
    // Must not deadlock: b has its own gate.
    let _guard_b = gates.lock(&b).await;
}

#[tokio::test]
async fn forget_releases_the_entry() {
    let gates = SessionGates::default();
    let session = SessionId::new();
    drop(gates.lock(&session).await);
    gates.forget(&session);
    // A fresh gate is created on demand.
    drop(gates.lock(&session).await);
}
