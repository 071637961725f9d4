// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state built from snapshot load + WAL replay.

use crate::merge::deep_merge;
use crate::mutation::{Mutation, Table};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// All tables of the relational contract, materialized in memory.
///
/// Records are stored as JSON objects; the [`crate::Store`] API layers
/// typed access on top. Applying mutations is table-agnostic, which
/// keeps WAL replay a single code path.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    #[serde(default)]
    tables: HashMap<Table, HashMap<String, Value>>,
}

impl MaterializedState {
    pub fn table(&self, table: Table) -> Option<&HashMap<String, Value>> {
        self.tables.get(&table)
    }

    pub fn table_mut(&mut self, table: Table) -> &mut HashMap<String, Value> {
        self.tables.entry(table).or_default()
    }

    /// Number of records in `table`.
    pub fn len(&self, table: Table) -> usize {
        self.tables.get(&table).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(HashMap::is_empty)
    }

    /// Apply one mutation. Idempotent for `Put` and `Remove`; `Patch` on
    /// a missing record is a no-op (the record was removed concurrently).
    pub fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::Put { table, key, record } => {
                self.table_mut(*table).insert(key.clone(), record.clone());
            }
            Mutation::Patch { table, key, patch } => {
                if let Some(existing) = self.table_mut(*table).get_mut(key) {
                    deep_merge(existing, patch);
                }
            }
            Mutation::Remove { table, key } => {
                self.table_mut(*table).remove(key);
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
