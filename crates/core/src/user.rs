// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User accounts, roles, and per-user agent defaults.

use crate::id::UserId;
use crate::session::{AgenticTool, PermissionMode};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Service-layer role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Member,
    Admin,
    Owner,
}

crate::simple_display! {
    Role {
        Viewer => "viewer",
        Member => "member",
        Admin => "admin",
        Owner => "owner",
    }
}

impl Role {
    /// True for roles allowed to administer users, repos, and terminals.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Owner)
    }
}

/// Per-tool defaults applied when a session omits explicit config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgenticDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<PermissionMode>,
}

/// An API key encrypted at rest (AES-256-GCM; nonce + ciphertext, base64).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub nonce: String,
    pub ciphertext: String,
}

/// A registered user of the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub email: String,
    /// Argon2 PHC string; never serialized onto the wire (services strip it).
    pub password_hash: String,
    pub role: Role,
    /// Unix account backing `strict` impersonation; sessions snapshot
    /// this at creation time and are not rewritten by later edits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unix_username: Option<String>,
    #[serde(default)]
    pub must_change_password: bool,
    /// Per-tool defaults, insertion-ordered for stable serialization.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub default_agentic_config: IndexMap<AgenticTool, AgenticDefaults>,
    /// Per-tool API keys, encrypted with the daemon secret.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub api_keys: IndexMap<AgenticTool, EncryptedSecret>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Redact secret material before the record leaves the daemon.
    pub fn redacted(&self) -> User {
        let mut user = self.clone();
        user.password_hash = String::new();
        user.api_keys = IndexMap::new();
        user
    }
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;
