// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agor login` — exchange credentials for the CLI token.

use crate::client::{self, CliToken};
use crate::output::OutputFormat;
use agor_wire::{Request, Response};
use anyhow::{anyhow, Result};
use clap::Args;
use std::io::Write as _;

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,
    /// Password (prompted when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

pub async fn run(args: LoginArgs, _format: OutputFormat) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => prompt_password()?,
    };

    let response =
        client::request(Request::Login { email: args.email.clone(), password }).await?;
    match response {
        Response::Authenticated { access_token, user, expires_at } => {
            let must_change = user.must_change_password;
            client::save_token(&CliToken {
                access_token,
                user: serde_json::to_value(&user)?,
                expires_at,
                daemon_url: std::env::var("AGOR_DAEMON_URL").ok(),
            })?;
            println!("logged in as {}", user.email);
            if must_change {
                println!("note: your password must be changed (`agor user update --password`)");
            }
            Ok(())
        }
        Response::Error { error } => Err(anyhow!("{}", error.message)),
        other => Err(anyhow!("unexpected response {other:?}")),
    }
}

fn prompt_password() -> Result<String> {
    // No TTY games: read a line from stdin after a prompt on stderr so
    // scripted logins can pipe the password in.
    eprint!("password: ");
    std::io::stderr().flush()?;
    let mut password = String::new();
    std::io::stdin().read_line(&mut password)?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}
