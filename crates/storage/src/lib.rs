// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agor-storage: the relational contract over a WAL + snapshot store.
//!
//! Mutations append to a write-ahead log and apply to an in-memory
//! [`MaterializedState`]; periodic checkpoints write a zstd-compressed
//! snapshot and truncate the log. Repositories expose typed CRUD with
//! deep-merge patches and short-ID prefix lookup on top.

mod entities;
mod merge;
mod mutation;
mod snapshot;
mod state;
mod store;
mod wal;

pub use entities::Entity;
pub use merge::deep_merge;
pub use mutation::{Mutation, Table};
pub use snapshot::{Snapshot, SnapshotError, SCHEMA_VERSION};
pub use state::MaterializedState;
pub use store::{Store, StoreError, StorePaths};
pub use wal::{Wal, WalError};
