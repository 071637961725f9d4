// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AES-256-GCM vault for per-user API keys at rest.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use agor_core::{AgorError, EncryptedSecret, ErrorKind};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

pub struct SecretVault {
    cipher: Aes256Gcm,
}

impl SecretVault {
    /// Derive the vault key from the daemon secret (sha256 → 32 bytes).
    pub fn from_secret(secret: &str) -> SecretVault {
        let mut hasher = Sha256::new();
        hasher.update(b"agor-vault:");
        hasher.update(secret.as_bytes());
        let digest = hasher.finalize();
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        SecretVault { cipher: Aes256Gcm::new(key) }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret, AgorError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self.cipher.encrypt(&nonce, plaintext.as_bytes()).map_err(|_| {
            AgorError::new(ErrorKind::ValidationFailed, "secret encryption failed")
        })?;
        Ok(EncryptedSecret {
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    pub fn decrypt(&self, secret: &EncryptedSecret) -> Result<String, AgorError> {
        let nonce_bytes = BASE64
            .decode(&secret.nonce)
            .map_err(|_| AgorError::new(ErrorKind::ValidationFailed, "malformed secret nonce"))?;
        let ciphertext = BASE64.decode(&secret.ciphertext).map_err(|_| {
            AgorError::new(ErrorKind::ValidationFailed, "malformed secret ciphertext")
        })?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|_| AgorError::new(ErrorKind::ValidationFailed, "secret decryption failed"))?;
        String::from_utf8(plaintext)
            .map_err(|_| AgorError::new(ErrorKind::ValidationFailed, "secret is not UTF-8"))
    }
}
