// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agor user` — account management.

use crate::client;
use crate::output::{cell, print_record, print_table, OutputFormat};
use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde_json::json;

#[derive(Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Create a user
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Role: owner, admin, member, viewer
        #[arg(long, default_value = "member")]
        role: String,
        /// Unix account override (derived from email when omitted)
        #[arg(long)]
        unix_username: Option<String>,
    },
    /// Update a user (by id or email prefix)
    Update {
        id: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        unix_username: Option<String>,
    },
    /// Delete a user
    Delete { id: String },
    /// List users
    List,
    /// Reconcile Unix accounts and group memberships
    SyncUnix {
        /// Target one user (all users when omitted)
        id: Option<String>,
        /// Dry run: report without changing the host
        #[arg(short = 'n', long)]
        dry_run: bool,
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Create missing Unix users
        #[arg(long)]
        create_users: bool,
        /// Sync group memberships
        #[arg(long)]
        sync_groups: bool,
        /// Create missing groups
        #[arg(long)]
        create_groups: bool,
    },
}

pub async fn run(args: UserArgs, format: OutputFormat) -> Result<()> {
    let client = client::connect_authenticated().await?;
    match args.command {
        UserCommand::Create { email, password, role, unix_username } => {
            let user = client
                .create(
                    "users",
                    json!({
                        "email": email,
                        "password": password,
                        "role": role,
                        "unix_username": unix_username,
                    }),
                )
                .await?;
            print_record(format, &user);
            Ok(())
        }
        UserCommand::Update { id, password, role, unix_username } => {
            let mut patch = serde_json::Map::new();
            if let Some(password) = password {
                patch.insert("password".into(), json!(password));
            }
            if let Some(role) = role {
                patch.insert("role".into(), json!(role));
            }
            if let Some(unix_username) = unix_username {
                patch.insert("unix_username".into(), json!(unix_username));
            }
            if patch.is_empty() {
                return Err(anyhow!("nothing to update"));
            }
            let user = client.patch("users", &id, serde_json::Value::Object(patch)).await?;
            print_record(format, &user);
            Ok(())
        }
        UserCommand::Delete { id } => {
            client.remove("users", &id).await?;
            println!("deleted {id}");
            Ok(())
        }
        UserCommand::List => {
            let users = client.find("users", json!({"$sort": {"email": 1}})).await?;
            let rows = users
                .iter()
                .map(|u| {
                    vec![
                        cell(u, "user_id").chars().take(8).collect(),
                        cell(u, "email"),
                        cell(u, "role"),
                        cell(u, "unix_username"),
                    ]
                })
                .collect();
            print_table(format, &["id", "email", "role", "unix"], rows);
            Ok(())
        }
        UserCommand::SyncUnix { id, dry_run, verbose, .. } => {
            let targets: Vec<String> = match id {
                Some(id) => vec![id],
                None => {
                    let users = client.find("users", json!({})).await?;
                    users
                        .iter()
                        .filter_map(|u| u.get("user_id").and_then(|v| v.as_str()))
                        .map(str::to_string)
                        .collect()
                }
            };
            for target in targets {
                if dry_run {
                    let view = client.call("users", "sync-view", Some(&target), json!({})).await?;
                    println!("would sync {target}");
                    if verbose {
                        print_record(format, &view);
                    }
                    continue;
                }
                match client.call("users", "sync-unix", Some(&target), json!({})).await {
                    Ok(_) => println!("sync dispatched for {target}"),
                    Err(e) => eprintln!("sync failed for {target}: {e}"),
                }
            }
            Ok(())
        }
    }
}
