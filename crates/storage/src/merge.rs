// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deep-merge for patch semantics.
//!
//! Patches are deep-merged in the repository layer so concurrent writers
//! touching different nested fields (e.g. `git_state.sha_at_start` vs
//! `git_state.sha_at_end`) never clobber each other.

use serde_json::Value;

/// Merge `patch` into `target` in place.
///
/// Objects merge recursively; every other value (including arrays and
/// null) replaces the target wholesale.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match target_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, patch_value),
                    None => {
                        target_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
