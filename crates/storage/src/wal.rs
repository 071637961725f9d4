// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log of mutations.
//!
//! One JSON document per line. Mutations are applied to the materialized
//! state first, then appended here; replay at startup re-applies
//! everything written since the last checkpoint. A torn final line
//! (crash mid-write) is dropped with a warning.

use crate::mutation::Mutation;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("WAL I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAL serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only mutation log.
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    entries: u64,
}

impl Wal {
    /// Open (creating parents and the file as needed) for appending.
    pub fn open(path: &Path) -> Result<Wal, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Wal { path: path.to_path_buf(), writer: BufWriter::new(file), entries: 0 })
    }

    /// Replay every recorded mutation in write order.
    pub fn replay(path: &Path, mut apply: impl FnMut(Mutation)) -> Result<u64, WalError> {
        if !path.exists() {
            return Ok(0);
        }
        let reader = BufReader::new(File::open(path)?);
        let mut count = 0u64;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Mutation>(&line) {
                Ok(mutation) => {
                    apply(mutation);
                    count += 1;
                }
                Err(e) => {
                    // Only acceptable on the final line (torn write).
                    warn!(error = %e, "dropping torn WAL entry");
                    break;
                }
            }
        }
        Ok(count)
    }

    /// Append one mutation and flush it to the OS.
    pub fn append(&mut self, mutation: &Mutation) -> Result<(), WalError> {
        serde_json::to_writer(&mut self.writer, mutation)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.entries += 1;
        Ok(())
    }

    /// Mutations appended since open or the last truncate.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Truncate after a successful checkpoint.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.entries = 0;
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
