// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token usage accounting shared by all tool adapters.

use serde::{Deserialize, Serialize};

/// Token counts for one task, after normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    #[serde(default)]
    pub input: u64,
    #[serde(default)]
    pub output: u64,
    #[serde(default)]
    pub cache_read: u64,
    #[serde(default)]
    pub cache_creation: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input + self.output + self.cache_read + self.cache_creation
    }
}

/// SDK response normalized to a common shape for storage and the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedUsage {
    pub token_usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl NormalizedUsage {
    pub fn total_tokens(&self) -> u64 {
        self.token_usage.total()
    }
}

/// Delta rule for tools whose SDK reports cumulative usage.
///
/// `current` and `previous` are cumulative figures from two successive
/// terminal tasks of the same session. When every field of `current` is
/// at least its `previous` counterpart, the stored value is the
/// difference. Any drop means the underlying CLI session restarted and
/// `current` is taken verbatim.
pub fn cumulative_delta(current: TokenUsage, previous: Option<TokenUsage>) -> TokenUsage {
    let Some(prev) = previous else {
        return current;
    };
    let restarted = current.input < prev.input
        || current.output < prev.output
        || current.cache_read < prev.cache_read
        || current.cache_creation < prev.cache_creation;
    if restarted {
        current
    } else {
        TokenUsage {
            input: current.input - prev.input,
            output: current.output - prev.output,
            cache_read: current.cache_read - prev.cache_read,
            cache_creation: current.cache_creation - prev.cache_creation,
        }
    }
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
