// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authentication: password hashing, JWTs, and the API-key vault.

mod jwt;
mod password;
mod vault;

pub use jwt::{Claims, TokenKind};
pub use password::{hash_password, verify_password};
pub use vault::SecretVault;

use agor_core::{AgorError, ErrorKind, User};
use agor_engine::TokenMinter;
use chrono::Utc;

/// Executor tokens are short-lived by design.
const EXECUTOR_TOKEN_TTL_HOURS: i64 = 24;

/// Shared auth state: signing secret + vault key.
pub struct AuthService {
    secret: String,
    vault: SecretVault,
    login_ttl_hours: i64,
}

impl AuthService {
    pub fn new(secret: impl Into<String>, login_ttl_hours: i64) -> AuthService {
        let secret = secret.into();
        let vault = SecretVault::from_secret(&secret);
        AuthService { secret, vault, login_ttl_hours }
    }

    pub fn vault(&self) -> &SecretVault {
        &self.vault
    }

    /// Mint a login token for a user.
    pub fn mint_login_token(&self, user: &User) -> Result<(String, i64), AgorError> {
        let expires_at = Utc::now().timestamp() + self.login_ttl_hours * 3600;
        let claims = Claims {
            sub: user.user_id.to_string(),
            exp: expires_at,
            kind: TokenKind::Login,
            jti: None,
        };
        Ok((jwt::encode(&claims, &self.secret)?, expires_at))
    }

    /// Validate any token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AgorError> {
        jwt::decode(token, &self.secret)
    }

    /// Inherent alias for the [`TokenMinter`] impl.
    pub fn executor_token(&self, user_id: &str, jti: &str) -> String {
        TokenMinter::mint_executor_token(self, user_id, jti)
    }

    /// Hash a channel key for storage/lookup (sha256 hex).
    pub fn fingerprint(key: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    /// Generate a fresh random secret (first daemon start).
    pub fn generate_secret() -> String {
        use aes_gcm::aead::{KeyInit, OsRng};
        let key = aes_gcm::Aes256Gcm::generate_key(OsRng);
        let mut out = String::with_capacity(64);
        for byte in key {
            use std::fmt::Write;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl TokenMinter for AuthService {
    fn mint_executor_token(&self, user_id: &str, task_id: &str) -> String {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: Utc::now().timestamp() + EXECUTOR_TOKEN_TTL_HOURS * 3600,
            kind: TokenKind::Executor,
            jti: Some(task_id.to_string()),
        };
        // Encoding HS256 with a valid key cannot fail in practice; fall
        // back to an empty token that simply won't authenticate.
        jwt::encode(&claims, &self.secret).unwrap_or_default()
    }
}

/// Validate an email shape well enough to derive identities from it.
pub fn validate_email(email: &str) -> Result<(), AgorError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AgorError::new(ErrorKind::ValidationFailed, "email must contain '@'"));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return Err(AgorError::new(
            ErrorKind::ValidationFailed,
            format!("invalid email address {email:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
