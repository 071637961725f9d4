// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions
//!
//! All entity IDs are UUIDv7 rendered as lowercase hyphenated text
//! (36 chars). The short form is the first 8 characters; repository
//! lookups additionally accept any unambiguous prefix of at least
//! [`MIN_PREFIX_LEN`] characters.

/// Length of the short-ID form shown in Unix group names and UIs.
pub const SHORT_ID_LEN: usize = 8;

/// Minimum prefix length accepted by prefix lookups.
pub const MIN_PREFIX_LEN: usize = 3;

/// Returns the first [`SHORT_ID_LEN`] characters of an ID string.
pub fn short_id(s: &str) -> &str {
    if s.len() <= SHORT_ID_LEN {
        s
    } else {
        &s[..SHORT_ID_LEN]
    }
}

/// Define a newtype ID wrapper holding UUIDv7 text.
///
/// Generates `new()` for time-ordered random generation, `from_string()`
/// for parsing, `as_str()`, `short()`, `Display`, `From<String>`,
/// `From<&str>`, `PartialEq<str>`, `Borrow<str>`, and `Deref`.
///
/// ```ignore
/// define_uuid_id! {
///     /// Doc comment for the ID type.
///     pub struct SessionId;
/// }
/// ```
#[macro_export]
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a new time-ordered (UUIDv7) ID.
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7().to_string())
            }

            /// Create ID from existing string (for parsing/deserialization)
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First 8 characters of the ID.
            pub fn short(&self) -> &str {
                $crate::id::short_id(&self.0)
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&String> for $name {
            fn from(s: &String) -> Self {
                Self(s.clone())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_uuid_id! {
    /// Identifies a registered user.
    pub struct UserId;
}

define_uuid_id! {
    /// Identifies a registered repository.
    pub struct RepoId;
}

define_uuid_id! {
    /// Identifies a git worktree derived from a repo.
    pub struct WorktreeId;
}

define_uuid_id! {
    /// Identifies a spatial board.
    pub struct BoardId;
}

define_uuid_id! {
    /// Identifies a long-running agent conversation against one worktree.
    pub struct SessionId;
}

define_uuid_id! {
    /// Identifies a single agent turn within a session.
    pub struct TaskId;
}

define_uuid_id! {
    /// Identifies one message in a session transcript.
    pub struct MessageId;
}

define_uuid_id! {
    /// Identifies a registered MCP server.
    pub struct McpServerId;
}

define_uuid_id! {
    /// Identifies a gateway channel binding.
    pub struct ChannelId;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
