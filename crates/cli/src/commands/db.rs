// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agor db` — snapshot schema status and migrations.

use crate::client;
use crate::exit_error::ExitError;
use crate::output::{print_record, OutputFormat};
use agor_storage::{Snapshot, SnapshotError, Wal, SCHEMA_VERSION};
use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;
use std::io::Write as _;

#[derive(Args)]
pub struct DbArgs {
    #[command(subcommand)]
    pub command: DbCommand,
}

#[derive(Subcommand)]
pub enum DbCommand {
    /// Show schema version and pending migrations
    Status {
        /// Include table row counts
        #[arg(short, long)]
        verbose: bool,
    },
    /// Apply pending snapshot migrations
    Migrate {
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

pub async fn run(args: DbArgs, format: OutputFormat) -> Result<()> {
    let db = agor_daemon::env::db_path(&client::data_home());
    let snapshot_path = db.join("snapshot.json.zst");
    let wal_path = db.join("events.wal");

    match args.command {
        DbCommand::Status { verbose } => {
            let on_disk = match Snapshot::version_on_disk(&snapshot_path) {
                Ok(version) => version,
                Err(SnapshotError::Corrupt(e)) => {
                    return Err(ExitError::operational(format!("snapshot corrupt: {e}")))
                }
                Err(e) => return Err(e.into()),
            };
            let mut status = json!({
                "path": snapshot_path,
                "schema_version": on_disk,
                "supported_version": SCHEMA_VERSION,
                "pending": on_disk.is_some_and(|v| v < SCHEMA_VERSION),
            });
            if verbose {
                let mut wal_entries = 0u64;
                let _ = Wal::replay(&wal_path, |_| wal_entries += 1);
                status["wal_entries"] = json!(wal_entries);
                if let Ok(state) = Snapshot::load(&snapshot_path) {
                    for table in [
                        agor_storage::Table::Users,
                        agor_storage::Table::Repos,
                        agor_storage::Table::Worktrees,
                        agor_storage::Table::Sessions,
                        agor_storage::Table::Tasks,
                        agor_storage::Table::Messages,
                    ] {
                        status[format!("rows_{table}")] = json!(state.len(table));
                    }
                }
            }
            print_record(format, &status);
            Ok(())
        }
        DbCommand::Migrate { yes } => {
            let on_disk = Snapshot::version_on_disk(&snapshot_path)?;
            match on_disk {
                None => {
                    println!("no snapshot yet; nothing to migrate");
                    return Ok(());
                }
                Some(version) if version == SCHEMA_VERSION => {
                    println!("schema v{version} is current");
                    return Ok(());
                }
                Some(version) if version > SCHEMA_VERSION => {
                    return Err(ExitError::operational(format!(
                        "snapshot v{version} is newer than this binary (v{SCHEMA_VERSION}); upgrade agor"
                    )));
                }
                Some(version) => {
                    if !yes && !confirm(version)? {
                        println!("aborted");
                        return Ok(());
                    }
                    // Load runs the stepwise migrations; save pins the
                    // new version.
                    let state = Snapshot::load(&snapshot_path)?;
                    Snapshot::save(&snapshot_path, &state)?;
                    println!("migrated snapshot v{version} → v{SCHEMA_VERSION}");
                    Ok(())
                }
            }
        }
    }
}

fn confirm(from: u32) -> Result<bool> {
    eprint!("migrate snapshot schema v{from} → v{SCHEMA_VERSION}? [y/N] ");
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
