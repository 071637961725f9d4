// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic Unix naming: groups and username derivation.

use crate::id::{short_id, RepoId, WorktreeId};

/// Global group every managed user belongs to.
pub const AGOR_USERS_GROUP: &str = "agor_users";

/// Maximum length of a Unix username.
const MAX_USERNAME_LEN: usize = 32;

/// Fallback when an email yields nothing usable.
const FALLBACK_USERNAME: &str = "agor_user";

/// Deterministic group name for a worktree: `agor_wt_<shortid(8)>`.
pub fn worktree_group(worktree_id: &WorktreeId) -> String {
    format!("agor_wt_{}", short_id(worktree_id.as_str()))
}

/// Deterministic group name for a repo: `agor_repo_<shortid(8)>`.
pub fn repo_group(repo_id: &RepoId) -> String {
    format!("agor_repo_{}", short_id(repo_id.as_str()))
}

/// Derive a Unix username from an email address.
///
/// Strip the domain, map `.` to `_`, lowercase, restrict to
/// `[a-z0-9_-]`, prefix `u_` when the first char is a digit or dash,
/// truncate to 32 chars. A pure function and a fixed point on valid
/// usernames of length ≤ 32.
pub fn derive_unix_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();

    let mut name: String = local
        .to_lowercase()
        .chars()
        .map(|c| if c == '.' { '_' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-'))
        .collect();

    if name.is_empty() {
        return FALLBACK_USERNAME.to_string();
    }

    if name.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        name.insert_str(0, "u_");
    }

    name.truncate(MAX_USERNAME_LEN);
    name
}

/// True when `name` is already a valid derived username.
pub fn is_valid_unix_username(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_USERNAME_LEN
        && !name.starts_with(|c: char| c.is_ascii_digit() || c == '-')
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-'))
}

#[cfg(test)]
#[path = "unix_names_tests.rs"]
mod tests;
