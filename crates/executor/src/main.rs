// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! agor-executor: one privileged action per process.
//!
//! The daemon spawns this binary (optionally via `sudo -u`), writes a
//! single payload line to stdin, and reads an `ExecutorResult` line
//! from stdout. Progress streams back through daemon custom routes —
//! never by direct event emission. Logs go to stderr so stdout stays a
//! clean result channel.

mod gitops;
mod prompt;
mod run;
mod streaming;
mod unixops;
mod zellij;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("AGOR_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = run::run().await;
    std::process::exit(code);
}
