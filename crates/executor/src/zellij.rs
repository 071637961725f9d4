// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal bridge actions: PTY attach and tab control.

use agor_adapters::{Terminal, TerminalKind, TerminalSpawn};
use agor_core::{AgorError, ErrorKind, Event};
use agor_wire::{DaemonClient, TerminalMode, ZellijAttachParams, ZellijTabParams};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

pub async fn attach(
    client: Arc<DaemonClient>,
    mut events: UnboundedReceiver<(Vec<String>, Event)>,
    params: ZellijAttachParams,
) -> Result<Option<Value>, AgorError> {
    // Register with the daemon first; it owns the terminal identity and
    // the authz decision.
    let registration = client
        .call(
            "terminals",
            "register",
            None,
            json!({
                "user_id": params.user_id,
                "worktree_id": params.worktree_id,
                "session_name": params.session_name,
                "mode": params.mode,
            }),
        )
        .await
        .map_err(|e| AgorError::new(ErrorKind::NetworkError, e.to_string()))?;
    let terminal_id = registration
        .get("terminal_id")
        .and_then(Value::as_str)
        .ok_or_else(|| AgorError::new(ErrorKind::ValidationFailed, "registration without id"))?
        .to_string();

    client
        .subscribe(vec![format!("terminal:{terminal_id}")])
        .await
        .map_err(|e| AgorError::new(ErrorKind::NetworkError, e.to_string()))?;

    let spawn = TerminalSpawn {
        kind: match params.mode {
            TerminalMode::Zellij => TerminalKind::Zellij,
            TerminalMode::Shell => TerminalKind::Shell,
        },
        session_name: params.session_name.clone(),
        cwd: params.cwd.clone(),
        cols: params.cols,
        rows: params.rows,
        tab_name: params.tab_name.clone(),
        env_file: params.env_file.clone(),
    };
    let (terminal, mut output) = Terminal::spawn(&spawn)?;
    info!(%terminal_id, mode = ?params.mode, "terminal attached");

    if let (TerminalMode::Zellij, Some(tab)) = (params.mode, &params.tab_name) {
        // Best effort; a fresh session may still be booting its layout.
        let _ = agor_adapters::zellij_tab(&params.session_name, tab, Some(&params.cwd)).await;
    }

    loop {
        tokio::select! {
            chunk = output.recv() => match chunk {
                Some(bytes) => {
                    let data = BASE64.encode(&bytes);
                    if client
                        .call("terminals", "output", Some(&terminal_id), json!({"data": data}))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                None => break,
            },
            event = events.recv() => match event {
                Some((_, Event::TerminalInput { terminal_id: id, data })) if id == terminal_id => {
                    if let Ok(bytes) = BASE64.decode(data.as_bytes()) {
                        terminal.write_input(&bytes)?;
                    }
                }
                Some((_, Event::TerminalResize { terminal_id: id, cols, rows }))
                    if id == terminal_id =>
                {
                    terminal.resize(cols, rows)?;
                }
                Some((_, Event::TerminalClosed { terminal_id: id })) if id == terminal_id => {
                    terminal.kill();
                    break;
                }
                Some(_) => {}
                None => {
                    debug!("daemon connection closed; tearing down terminal");
                    terminal.kill();
                    break;
                }
            },
        }
    }

    let _ = client.call("terminals", "closed", Some(&terminal_id), json!({})).await;
    Ok(Some(json!({"terminal_id": terminal_id})))
}

pub async fn tab(params: ZellijTabParams) -> Result<Option<Value>, AgorError> {
    agor_adapters::zellij_tab(&params.session_name, &params.tab_name, params.cwd.as_deref())
        .await?;
    Ok(None)
}
