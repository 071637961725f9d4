// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! agord: the Agor daemon binary.

use agor_core::SystemClock;
use agor_daemon::lifecycle::{startup, DaemonPaths};
use agor_engine::ProcessSpawner;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let data_home = agor_daemon::env::data_home();
    let paths = DaemonPaths::new(data_home);

    if let Err(e) = std::fs::create_dir_all(paths.log_path.parent().unwrap_or(&paths.data_home)) {
        eprintln!("cannot create log directory: {e}");
        std::process::exit(1);
    }
    let file_appender = tracing_appender::rolling::never(
        paths.log_path.parent().unwrap_or(&paths.data_home),
        "daemon.log",
    );
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(agor_daemon::env::log_filter()))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    // The spawner default is fixed up by config inside startup; the
    // engine re-reads its executor path from EngineConfig.
    let spawner = Arc::new(ProcessSpawner::new(
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("agor-executor")))
            .unwrap_or_else(|| "agor-executor".into()),
    ));

    let mut daemon = match startup(paths, SystemClock, spawner).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("startup failed: {e}");
            eprintln!("agord: {e}");
            std::process::exit(1);
        }
    };

    // Signal readiness for wrappers tailing stdout.
    println!("READY");

    let listener_task = daemon.take_listener().map(|listener| {
        tokio::spawn(agor_daemon::listener::run(
            listener,
            daemon.state.clone(),
            daemon.shutdown.clone(),
        ))
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
        _ = wait_for_sigterm() => info!("SIGTERM received"),
        _ = daemon.shutdown.cancelled() => info!("shutdown requested over the wire"),
    }

    agor_daemon::lifecycle::shutdown(&daemon).await;
    if let Some(task) = listener_task {
        task.abort();
    }
}

async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(_) => std::future::pending::<()>().await,
    }
}
