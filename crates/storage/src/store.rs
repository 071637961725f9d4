// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The typed repository layer: CRUD, deep-merge patch, prefix lookup.

use crate::entities::Entity;
use crate::mutation::{Mutation, Table};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use agor_core::id::MIN_PREFIX_LEN;
use agor_core::{AgorError, Clock, ErrorKind};
use parking_lot::Mutex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Wal(#[from] WalError),
}

/// Filesystem locations of the store.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub wal_path: PathBuf,
    pub snapshot_path: PathBuf,
}

impl StorePaths {
    /// Standard layout under a data home: `<data>/db/{events.wal, snapshot.json.zst}`.
    pub fn under(data_home: &std::path::Path) -> Self {
        let db = data_home.join("db");
        Self { wal_path: db.join("events.wal"), snapshot_path: db.join("snapshot.json.zst") }
    }
}

/// Shared handle to the materialized state + WAL.
///
/// Every mutation applies to memory under the lock, then appends to the
/// WAL before the lock releases, so observers never see un-durable state
/// ordering (step N+1 durable before step N).
pub struct Store<C: Clock> {
    paths: StorePaths,
    inner: Mutex<Inner>,
    clock: C,
}

struct Inner {
    state: MaterializedState,
    wal: Wal,
}

impl<C: Clock> Store<C> {
    /// Open the store: load + migrate the snapshot, replay the WAL.
    pub fn open(paths: StorePaths, clock: C) -> Result<Arc<Self>, StoreError> {
        let mut state = Snapshot::load(&paths.snapshot_path)?;
        let replayed = Wal::replay(&paths.wal_path, |m| state.apply(&m))?;
        if replayed > 0 {
            info!(replayed, "replayed WAL entries");
        }
        let wal = Wal::open(&paths.wal_path)?;
        Ok(Arc::new(Store { paths, inner: Mutex::new(Inner { state, wal }), clock }))
    }

    /// In-memory store for tests: tempdir-backed WAL.
    pub fn open_in(dir: &std::path::Path, clock: C) -> Result<Arc<Self>, StoreError> {
        Self::open(StorePaths::under(dir), clock)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Write the snapshot and truncate the WAL.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        Snapshot::save(&self.paths.snapshot_path, &inner.state)?;
        inner.wal.truncate()?;
        Ok(())
    }

    /// Insert a new record; `Conflict` if the key or a unique field exists.
    pub fn create<T: Entity>(&self, record: T) -> Result<T, AgorError> {
        let key = record.key();
        let mut inner = self.inner.lock();
        if inner.state.table(T::TABLE).is_some_and(|t| t.contains_key(&key)) {
            return Err(AgorError::new(
                ErrorKind::Conflict,
                format!("{} {key} already exists", T::TABLE),
            ));
        }
        if let Some(conflict) = T::unique_conflict(&inner.state, &record, &key) {
            return Err(conflict);
        }
        let value = to_value(&record)?;
        inner.commit(Mutation::Put { table: T::TABLE, key, record: value })?;
        Ok(record)
    }

    /// Insert or replace, enforcing unique constraints.
    pub fn put<T: Entity>(&self, record: T) -> Result<T, AgorError> {
        let key = record.key();
        let mut inner = self.inner.lock();
        if let Some(conflict) = T::unique_conflict(&inner.state, &record, &key) {
            return Err(conflict);
        }
        let value = to_value(&record)?;
        inner.commit(Mutation::Put { table: T::TABLE, key, record: value })?;
        Ok(record)
    }

    /// Fetch by full ID or unambiguous prefix (≥ 3 chars).
    pub fn get<T: Entity>(&self, id: &str) -> Result<T, AgorError> {
        let inner = self.inner.lock();
        let value = resolve(&inner.state, T::TABLE, id)?.1;
        from_value(value)
    }

    /// Resolve a (possibly short) ID to the full key without fetching.
    pub fn resolve_id<T: Entity>(&self, id: &str) -> Result<String, AgorError> {
        let inner = self.inner.lock();
        Ok(resolve(&inner.state, T::TABLE, id)?.0)
    }

    /// Fetch by exact key, `None` when absent.
    pub fn maybe_get<T: Entity>(&self, key: &str) -> Option<T> {
        let inner = self.inner.lock();
        let value = inner.state.table(T::TABLE)?.get(key)?.clone();
        drop(inner);
        serde_json::from_value(value).ok()
    }

    /// All records of a table (unordered).
    pub fn all<T: Entity>(&self) -> Vec<T> {
        let inner = self.inner.lock();
        let Some(rows) = inner.state.table(T::TABLE) else {
            return Vec::new();
        };
        rows.values().filter_map(|v| serde_json::from_value(v.clone()).ok()).collect()
    }

    /// All records as raw JSON for query application.
    pub fn all_raw(&self, table: Table) -> Vec<Value> {
        let inner = self.inner.lock();
        inner.state.table(table).map(|rows| rows.values().cloned().collect()).unwrap_or_default()
    }

    /// Deep-merge `patch` into the record; bumps `updated_at`.
    pub fn patch<T: Entity>(&self, id: &str, patch: Value) -> Result<T, AgorError> {
        let mut inner = self.inner.lock();
        let (key, _) = resolve(&inner.state, T::TABLE, id)?;
        let mut patch = patch;
        if T::HAS_UPDATED_AT {
            if let Value::Object(obj) = &mut patch {
                obj.insert("updated_at".into(), to_value(&self.clock.utc_now())?);
            }
        }
        inner.commit(Mutation::Patch { table: T::TABLE, key: key.clone(), patch })?;
        let value = inner
            .state
            .table(T::TABLE)
            .and_then(|t| t.get(&key))
            .cloned()
            .ok_or_else(|| AgorError::not_found(format!("{} {key}", T::TABLE)))?;
        from_value(value)
    }

    /// Read-modify-write under the store lock.
    pub fn update<T: Entity>(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut T),
    ) -> Result<T, AgorError> {
        let mut inner = self.inner.lock();
        let (key, value) = resolve(&inner.state, T::TABLE, id)?;
        let mut record: T = from_value(value)?;
        mutate(&mut record);
        if let Some(conflict) = T::unique_conflict(&inner.state, &record, &key) {
            return Err(conflict);
        }
        let value = to_value(&record)?;
        inner.commit(Mutation::Put { table: T::TABLE, key, record: value })?;
        Ok(record)
    }

    /// Remove a record, returning it.
    pub fn remove<T: Entity>(&self, id: &str) -> Result<T, AgorError> {
        let mut inner = self.inner.lock();
        let (key, value) = resolve(&inner.state, T::TABLE, id)?;
        let record: T = from_value(value)?;
        inner.commit(Mutation::Remove { table: T::TABLE, key })?;
        Ok(record)
    }

    /// Number of records in a table.
    pub fn len(&self, table: Table) -> usize {
        self.inner.lock().state.len(table)
    }

    /// Run a closure against a consistent read snapshot of the state.
    pub fn read<R>(&self, f: impl FnOnce(&MaterializedState) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.state)
    }
}

impl Inner {
    /// Apply to memory, then append to the WAL.
    fn commit(&mut self, mutation: Mutation) -> Result<(), AgorError> {
        self.state.apply(&mutation);
        self.wal.append(&mutation).map_err(|e| {
            AgorError::new(ErrorKind::FilesystemError, format!("WAL append failed: {e}"))
        })
    }
}

/// Exact match first, then unambiguous prefix.
fn resolve(
    state: &MaterializedState,
    table: Table,
    id: &str,
) -> Result<(String, Value), AgorError> {
    let rows = state
        .table(table)
        .ok_or_else(|| AgorError::not_found(format!("{table} {id}")))?;
    if let Some(value) = rows.get(id) {
        return Ok((id.to_string(), value.clone()));
    }
    if id.len() >= MIN_PREFIX_LEN {
        let mut matches: Vec<&String> = rows.keys().filter(|k| k.starts_with(id)).collect();
        matches.sort();
        match matches.len() {
            0 => {}
            1 => {
                let key = matches[0].clone();
                let value = rows
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| AgorError::not_found(format!("{table} {key}")))?;
                return Ok((key, value));
            }
            _ => {
                let listed: Vec<String> = matches.into_iter().cloned().collect();
                return Err(AgorError::ambiguous_prefix(id, &listed));
            }
        }
    }
    Err(AgorError::not_found(format!("{table} {id}")))
}

fn to_value<T: serde::Serialize>(record: &T) -> Result<Value, AgorError> {
    serde_json::to_value(record).map_err(|e| {
        AgorError::new(ErrorKind::ValidationFailed, format!("record serialization failed: {e}"))
    })
}

fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, AgorError> {
    serde_json::from_value(value).map_err(|e| {
        AgorError::new(ErrorKind::ValidationFailed, format!("record deserialization failed: {e}"))
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
