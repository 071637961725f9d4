// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Zstd-compressed state snapshots with schema migrations.

use crate::state::MaterializedState;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Current snapshot schema version.
///
/// v1 stored worktree owners as an `owners` array on each worktree row;
/// v2 hoists them into the `worktree_owners` junction table.
pub const SCHEMA_VERSION: u32 = 2;

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("snapshot schema v{found} is newer than supported v{supported}; upgrade the daemon")]
    MigrationPending { found: u32, supported: u32 },
}

/// On-disk snapshot envelope.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub state: Value,
}

impl Snapshot {
    /// Load, decompress, and migrate a snapshot. Missing file → empty state.
    pub fn load(path: &Path) -> Result<MaterializedState, SnapshotError> {
        if !path.exists() {
            return Ok(MaterializedState::default());
        }
        let compressed = std::fs::read(path)?;
        let bytes = zstd::decode_all(compressed.as_slice())?;
        let mut snapshot: Snapshot = serde_json::from_slice(&bytes)?;

        if snapshot.schema_version > SCHEMA_VERSION {
            return Err(SnapshotError::MigrationPending {
                found: snapshot.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        while snapshot.schema_version < SCHEMA_VERSION {
            let from = snapshot.schema_version;
            snapshot = migrate_step(snapshot)?;
            info!(from, to = snapshot.schema_version, "migrated snapshot schema");
        }

        Ok(serde_json::from_value(snapshot.state)?)
    }

    /// Serialize, compress, and atomically replace the snapshot file.
    pub fn save(path: &Path, state: &MaterializedState) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot =
            Snapshot { schema_version: SCHEMA_VERSION, state: serde_json::to_value(state)? };
        let bytes = serde_json::to_vec(&snapshot)?;
        let compressed = zstd::encode_all(bytes.as_slice(), ZSTD_LEVEL)?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, compressed)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Schema version of the snapshot on disk, if any.
    pub fn version_on_disk(path: &Path) -> Result<Option<u32>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }
        let compressed = std::fs::read(path)?;
        let bytes = zstd::decode_all(compressed.as_slice())?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        Ok(Some(snapshot.schema_version))
    }
}

fn migrate_step(snapshot: Snapshot) -> Result<Snapshot, SnapshotError> {
    match snapshot.schema_version {
        1 => migrate_v1_to_v2(snapshot),
        // Guarded by the MigrationPending check in load().
        v => Ok(Snapshot { schema_version: v + 1, state: snapshot.state }),
    }
}

/// v1 → v2: hoist per-worktree `owners` arrays into the junction table.
fn migrate_v1_to_v2(mut snapshot: Snapshot) -> Result<Snapshot, SnapshotError> {
    let tables = snapshot.state.get_mut("tables").and_then(Value::as_object_mut);
    if let Some(tables) = tables {
        let mut junction = serde_json::Map::new();
        if let Some(worktrees) = tables.get_mut("worktrees").and_then(Value::as_object_mut) {
            for (worktree_id, row) in worktrees.iter_mut() {
                let owners = match row.as_object_mut().and_then(|r| r.remove("owners")) {
                    Some(Value::Array(owners)) => owners,
                    _ => continue,
                };
                for owner in owners.iter().filter_map(Value::as_str) {
                    let key = format!("{worktree_id}:{owner}");
                    let created_at =
                        row.get("created_at").cloned().unwrap_or(Value::Null);
                    junction.insert(
                        key,
                        serde_json::json!({
                            "worktree_id": worktree_id,
                            "user_id": owner,
                            "created_at": created_at,
                        }),
                    );
                }
            }
        }
        if !junction.is_empty() {
            let table = tables
                .entry("worktree_owners".to_string())
                .or_insert_with(|| Value::Object(Default::default()));
            if let Some(table) = table.as_object_mut() {
                for (key, row) in junction {
                    table.entry(key).or_insert(row);
                }
            }
        }
    }
    Ok(Snapshot { schema_version: 2, state: snapshot.state })
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
