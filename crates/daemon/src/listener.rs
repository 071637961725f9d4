// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Each connection gets a reader loop (requests, handled serially so
//! response order matches request order) and a writer task (responses
//! plus channel events). Subscriptions hang the connection's bounded
//! queue off the channel hub; overflow disconnects that subscriber only.

use crate::auth::TokenKind;
use crate::env::PROTOCOL_VERSION;
use crate::hooks::Principal;
use crate::state::AppState;
use agor_core::{AgorError, Clock, ErrorKind, SessionStatus, User};
use agor_wire::{
    read_message, write_message, DaemonStatus, LoginUser, ProtocolError, Request, Response,
};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Listener loop: accept until shutdown.
pub async fn run<C: Clock + 'static>(
    listener: UnixListener,
    state: Arc<AppState<C>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let state = state.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state, shutdown).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("accept error: {e}"),
            },
            _ = shutdown.cancelled() => {
                info!("listener shutting down");
                return;
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("client disconnected"),
        other => warn!("connection error: {other}"),
    }
}

async fn handle_connection<C: Clock + 'static>(
    stream: UnixStream,
    state: Arc<AppState<C>>,
    shutdown: CancellationToken,
) -> Result<(), ProtocolError> {
    let (mut reader, mut writer) = stream.into_split();

    // Writer task: responses in request order + interleaved events.
    let (out_tx, mut out_rx) = mpsc::channel::<Response>(1024);
    let writer_task = tokio::spawn(async move {
        while let Some(response) = out_rx.recv().await {
            if write_message(&mut writer, &response).await.is_err() {
                break;
            }
        }
    });

    // Event subscription: registered up front; channels join on demand.
    let (subscriber_id, mut event_rx) = state.hub.register();
    let event_out = out_tx.clone();
    let event_task = tokio::spawn(async move {
        while let Some((channels, event)) = event_rx.recv().await {
            if event_out.send(Response::Event { channels, event }).await.is_err() {
                break;
            }
        }
    });

    let mut principal = Principal::Anonymous;
    // The anonymous strategy (when enabled) may subscribe and read.
    let mut authenticated = state.config.auth.allow_anonymous;

    let result = loop {
        let request = tokio::select! {
            request = read_message::<Request, _>(&mut reader) => request,
            _ = shutdown.cancelled() => {
                let _ = out_tx.send(Response::ShuttingDown).await;
                break Ok(());
            }
        };
        let request = match request {
            Ok(request) => request,
            Err(ProtocolError::ConnectionClosed) => break Ok(()),
            Err(e) => break Err(e),
        };

        let response = match request {
            Request::Ping => Response::Pong,
            Request::Hello { version, token } => {
                debug!(client_version = %version, "hello");
                match token {
                    Some(token) => match resolve_token(&state, &token) {
                        Ok(resolved) => {
                            principal = resolved;
                            authenticated = true;
                            Response::Hello { version: PROTOCOL_VERSION.to_string() }
                        }
                        Err(error) => Response::error(error),
                    },
                    None => Response::Hello { version: PROTOCOL_VERSION.to_string() },
                }
            }
            Request::Login { email, password } => match login(&state, &email, &password) {
                Ok((token, user, expires_at)) => {
                    principal = Principal::User(user.clone());
                    authenticated = true;
                    Response::Authenticated {
                        access_token: token,
                        user: LoginUser {
                            user_id: user.user_id.to_string(),
                            email: user.email,
                            role: user.role.to_string(),
                            must_change_password: user.must_change_password,
                        },
                        expires_at,
                    }
                }
                Err(error) => Response::error(error),
            },
            Request::Subscribe { channels } => {
                if authenticated || principal.user().is_some() {
                    state.hub.join(subscriber_id, &channels);
                    Response::Subscribed { channels }
                } else {
                    Response::error(AgorError::new(
                        ErrorKind::NotAuthenticated,
                        "subscribe requires authentication",
                    ))
                }
            }
            Request::Unsubscribe { channels } => {
                state.hub.leave(subscriber_id, &channels);
                Response::Ok
            }
            Request::Status => status(&state),
            Request::Shutdown => match principal.role() {
                Some(role) if role.is_admin() => {
                    info!(by = %principal.describe(), "shutdown requested");
                    shutdown.cancel();
                    Response::ShuttingDown
                }
                _ => Response::error(AgorError::forbidden("shutdown requires the admin role")),
            },
            service_request => {
                state
                    .registry()
                    .dispatch(&state.hub, principal.clone(), service_request)
                    .await
            }
        };

        if out_tx.send(response).await.is_err() {
            break Ok(());
        }
    };

    state.hub.unregister(subscriber_id);
    event_task.abort();
    drop(out_tx);
    let _ = writer_task.await;
    result
}

/// Turn a Hello token into a principal.
fn resolve_token<C: Clock + 'static>(
    state: &AppState<C>,
    token: &str,
) -> Result<Principal, AgorError> {
    let claims = state.auth.verify(token)?;
    let user: User = state
        .store
        .get(&claims.sub)
        .map_err(|_| AgorError::new(ErrorKind::NotAuthenticated, "token user no longer exists"))?;
    Ok(match claims.kind {
        TokenKind::Login => Principal::User(user),
        TokenKind::Executor => Principal::Executor { user, task_id: claims.jti },
    })
}

fn login<C: Clock + 'static>(
    state: &AppState<C>,
    email: &str,
    password: &str,
) -> Result<(String, User, i64), AgorError> {
    let user = state
        .store
        .all::<User>()
        .into_iter()
        .find(|u| u.email == email)
        .ok_or_else(|| AgorError::new(ErrorKind::NotAuthenticated, "unknown email or password"))?;
    if !crate::auth::verify_password(password, &user.password_hash) {
        return Err(AgorError::new(ErrorKind::NotAuthenticated, "unknown email or password"));
    }
    let (token, expires_at) = state.auth.mint_login_token(&user)?;
    Ok((token, user, expires_at))
}

fn status<C: Clock + 'static>(state: &AppState<C>) -> Response {
    let sessions_active = state
        .store
        .all::<agor_core::Session>()
        .iter()
        .filter(|s| {
            matches!(s.status, SessionStatus::Running | SessionStatus::AwaitingPermission)
        })
        .count();
    Response::Status {
        status: DaemonStatus {
            version: PROTOCOL_VERSION.to_string(),
            uptime_secs: state.start_time.elapsed().as_secs(),
            sessions_active,
            executors_running: state.engine.executors_running(),
            push_listeners: state.gateway.listening_count(),
        },
    }
}
