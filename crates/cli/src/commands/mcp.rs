// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agor mcp` — MCP server registry.

use crate::client;
use crate::output::{cell, print_record, print_table, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

#[derive(Args)]
pub struct McpArgs {
    #[command(subcommand)]
    pub command: McpCommand,
}

#[derive(Subcommand)]
pub enum McpCommand {
    /// Register an MCP server
    Add {
        name: String,
        /// Command line (stdio) or URL (http/sse)
        target: String,
        /// Transport: stdio, http, sse
        #[arg(long, default_value = "stdio")]
        transport: String,
        /// KEY=VALUE environment entries
        #[arg(long = "env", value_name = "KEY=VALUE")]
        env: Vec<String>,
    },
    /// List registered servers
    List,
    /// Show one server
    Show { id: String },
}

pub async fn run(args: McpArgs, format: OutputFormat) -> Result<()> {
    let client = client::connect_authenticated().await?;
    match args.command {
        McpCommand::Add { name, target, transport, env } => {
            let mut env_map = serde_json::Map::new();
            for entry in env {
                match entry.split_once('=') {
                    Some((key, value)) => {
                        env_map.insert(key.to_string(), json!(value));
                    }
                    None => {
                        return Err(anyhow::anyhow!("bad --env entry {entry:?}; expected KEY=VALUE"))
                    }
                }
            }
            let server = client
                .create(
                    "mcp-servers",
                    json!({
                        "name": name,
                        "target": target,
                        "transport": transport,
                        "env": env_map,
                    }),
                )
                .await?;
            print_record(format, &server);
            Ok(())
        }
        McpCommand::List => {
            let servers = client.find("mcp-servers", json!({"$sort": {"name": 1}})).await?;
            let rows = servers
                .iter()
                .map(|s| {
                    vec![
                        cell(s, "mcp_server_id").chars().take(8).collect(),
                        cell(s, "name"),
                        cell(s, "transport"),
                        cell(s, "target"),
                    ]
                })
                .collect();
            print_table(format, &["id", "name", "transport", "target"], rows);
            Ok(())
        }
        McpCommand::Show { id } => {
            let server = client.get("mcp-servers", &id).await?;
            print_record(format, &server);
            Ok(())
        }
    }
}
