// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! agor: the Agor control-plane CLI.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod exit_error;
mod output;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "agor", about = "Drive AI coding agents across shared worktrees", version)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Authenticate and store the CLI token
    Login(commands::login::LoginArgs),
    /// Daemon management
    Daemon(commands::daemon::DaemonArgs),
    /// Database status and migrations
    Db(commands::db::DbArgs),
    /// User management
    User(commands::user::UserArgs),
    /// Worktree access (shell, ssh)
    Worktree(commands::worktree::WorktreeArgs),
    /// MCP server registry
    Mcp(commands::mcp::McpArgs),
    /// Open a worktree's app URL
    Open(commands::open::OpenArgs),
    /// Privileged host administration
    Admin(commands::admin::AdminArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Login(args) => commands::login::run(args, cli.format).await,
        Command::Daemon(args) => commands::daemon::run(args, cli.format).await,
        Command::Db(args) => commands::db::run(args, cli.format).await,
        Command::User(args) => commands::user::run(args, cli.format).await,
        Command::Worktree(args) => commands::worktree::run(args, cli.format).await,
        Command::Mcp(args) => commands::mcp::run(args, cli.format).await,
        Command::Open(args) => commands::open::run(args, cli.format).await,
        Command::Admin(args) => commands::admin::run(args, cli.format).await,
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            // Operational failures exit 1 with the message on stderr.
            let code = e.downcast_ref::<ExitError>().map(|e| e.code).unwrap_or(1);
            eprintln!("agor: {e}");
            std::process::exit(code);
        }
    }
}
