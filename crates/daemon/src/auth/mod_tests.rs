// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use agor_core::test_support::UserBuilder;
use agor_engine::TokenMinter;
use yare::parameterized;

fn auth() -> AuthService {
    AuthService::new("test-secret", 24)
}

#[test]
fn password_hash_verifies_and_rejects() {
    let hash = hash_password("hunter2").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("hunter2", &hash));
    assert!(!verify_password("wrong", &hash));
    assert!(!verify_password("hunter2", "not-a-hash"));
}

#[test]
fn login_token_round_trips() {
    let auth = auth();
    let user = UserBuilder::default().build();
    let (token, expires_at) = auth.mint_login_token(&user).unwrap();

    let claims = auth.verify(&token).unwrap();
    assert_eq!(claims.sub, user.user_id.as_str());
    assert_eq!(claims.kind, TokenKind::Login);
    assert_eq!(claims.exp, expires_at);
}

#[test]
fn executor_token_carries_task_jti() {
    let auth = auth();
    let token = auth.mint_executor_token("u-1", "t-1");
    let claims = auth.verify(&token).unwrap();
    assert_eq!(claims.kind, TokenKind::Executor);
    assert_eq!(claims.jti.as_deref(), Some("t-1"));
}

#[test]
fn foreign_secret_is_rejected() {
    let token = auth().mint_executor_token("u-1", "t-1");
    let other = AuthService::new("different-secret", 24);
    assert!(other.verify(&token).is_err());
}

#[test]
fn vault_round_trips_and_binds_to_secret() {
    let auth = auth();
    let encrypted = auth.vault().encrypt("sk-ant-secret").unwrap();
    assert_ne!(encrypted.ciphertext, "sk-ant-secret");
    assert_eq!(auth.vault().decrypt(&encrypted).unwrap(), "sk-ant-secret");

    let other = AuthService::new("different-secret", 24);
    assert!(other.vault().decrypt(&encrypted).is_err());
}

#[test]
fn fingerprints_are_stable_hex() {
    let a = AuthService::fingerprint("channel-key");
    let b = AuthService::fingerprint("channel-key");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    assert_ne!(a, AuthService::fingerprint("other-key"));
}

#[parameterized(
    plain = { "alice@example.com", true },
    subdomain = { "a@b.example.org", true },
    no_at = { "alice.example.com", false },
    no_domain_dot = { "alice@localhost", false },
    empty_local = { "@example.com", false },
    spacey = { "a lice@example.com", false },
)]
fn email_validation(email: &str, ok: bool) {
    assert_eq!(validate_email(email).is_ok(), ok, "{email}");
}

#[test]
fn generated_secrets_are_unique_hex() {
    let a = AuthService::generate_secret();
    let b = AuthService::generate_secret();
    assert_eq!(a.len(), 64);
    assert_ne!(a, b);
}
