// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agor admin` — privileged host administration for worktree groups.

use crate::client;
use crate::output::OutputFormat;
use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

#[derive(Args)]
pub struct AdminArgs {
    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Create (or repair) a worktree's Unix group and ACLs
    CreateWorktreeGroup { worktree_id: String },
    /// Remove a worktree's Unix group and symlinks
    DeleteWorktreeGroup { worktree_id: String },
    /// Add a user to a worktree (ownership + group membership)
    AddToWorktreeGroup {
        worktree_id: String,
        #[arg(long)]
        user_id: String,
    },
}

pub async fn run(args: AdminArgs, _format: OutputFormat) -> Result<()> {
    let client = client::connect_authenticated().await?;
    match args.command {
        AdminCommand::CreateWorktreeGroup { worktree_id } => {
            client.call("worktrees", "sync", Some(&worktree_id), json!({})).await?;
            println!("group sync dispatched for {worktree_id}");
        }
        AdminCommand::DeleteWorktreeGroup { worktree_id } => {
            client
                .call("worktrees", "sync", Some(&worktree_id), json!({"delete": true}))
                .await?;
            println!("group removal dispatched for {worktree_id}");
        }
        AdminCommand::AddToWorktreeGroup { worktree_id, user_id } => {
            client
                .call("worktrees", "add-owner", Some(&worktree_id), json!({"user_id": user_id}))
                .await?;
            println!("added {user_id} to {worktree_id}");
        }
    }
    Ok(())
}
