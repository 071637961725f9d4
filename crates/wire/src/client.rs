// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client over the framed protocol.
//!
//! Responses arrive in request order; pushed events interleave freely.
//! A reader task splits the stream: `Event` frames go to the event
//! channel, everything else resolves the oldest pending request.

use crate::frame::{read_message, write_message, ProtocolError};
use crate::request::Request;
use crate::response::Response;
use agor_core::{AgorError, Event};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Daemon(AgorError),

    #[error("connection lost")]
    ConnectionLost,

    #[error("daemon rejected handshake: {0}")]
    Handshake(String),
}

impl From<AgorError> for ClientError {
    fn from(err: AgorError) -> Self {
        ClientError::Daemon(err)
    }
}

type Pending = Arc<std::sync::Mutex<VecDeque<oneshot::Sender<Response>>>>;

/// Shared handle to one daemon connection.
pub struct DaemonClient {
    writer: Mutex<OwnedWriteHalf>,
    pending: Pending,
    version: String,
}

impl DaemonClient {
    /// Connect over the Unix socket and complete the Hello handshake.
    /// Returns the client plus the pushed-event stream.
    pub async fn connect(
        socket_path: &Path,
        version: &str,
        token: Option<&str>,
    ) -> Result<(Arc<DaemonClient>, mpsc::UnboundedReceiver<(Vec<String>, Event)>), ClientError>
    {
        let stream = UnixStream::connect(socket_path).await.map_err(ProtocolError::Io)?;
        let (mut reader, writer) = stream.into_split();

        let pending: Pending = Arc::new(std::sync::Mutex::new(VecDeque::new()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            loop {
                match read_message::<Response, _>(&mut reader).await {
                    Ok(Response::Event { channels, event }) => {
                        if event_tx.send((channels, event)).is_err() {
                            break;
                        }
                    }
                    Ok(response) => {
                        let waiter = reader_pending
                            .lock()
                            .ok()
                            .and_then(|mut queue| queue.pop_front());
                        match waiter {
                            Some(tx) => {
                                let _ = tx.send(response);
                            }
                            None => debug!("response with no pending request"),
                        }
                    }
                    Err(ProtocolError::ConnectionClosed) => break,
                    Err(e) => {
                        debug!(error = %e, "client reader error");
                        break;
                    }
                }
            }
            // Fail anything still waiting.
            if let Ok(mut queue) = reader_pending.lock() {
                queue.clear();
            }
        });

        let client = Arc::new(DaemonClient {
            writer: Mutex::new(writer),
            pending,
            version: version.to_string(),
        });

        let hello = client
            .request(Request::Hello {
                version: version.to_string(),
                token: token.map(str::to_string),
            })
            .await?;
        match hello {
            Response::Hello { .. } => Ok((client, event_rx)),
            Response::Error { error } => Err(ClientError::Handshake(error.message)),
            other => Err(ClientError::Handshake(format!("unexpected response {other:?}"))),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Send one request and await its (order-matched) response.
    pub async fn request(&self, request: Request) -> Result<Response, ClientError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut writer = self.writer.lock().await;
            // Enqueue before writing so the reader can never race us.
            if let Ok(mut queue) = self.pending.lock() {
                queue.push_back(tx);
            }
            write_message(&mut *writer, &request).await?;
        }
        rx.await.map_err(|_| ClientError::ConnectionLost)
    }

    /// Request that must return a record payload.
    pub async fn expect_record(&self, request: Request) -> Result<Value, ClientError> {
        match self.request(request).await? {
            Response::Record { data } => Ok(data),
            Response::Ok => Ok(Value::Null),
            Response::Error { error } => Err(error.into()),
            other => Err(ClientError::Handshake(format!("unexpected response {other:?}"))),
        }
    }

    pub async fn find(&self, service: &str, query: Value) -> Result<Vec<Value>, ClientError> {
        match self.request(Request::Find { service: service.into(), query }).await? {
            Response::Records { data, .. } => Ok(data),
            Response::Error { error } => Err(error.into()),
            other => Err(ClientError::Handshake(format!("unexpected response {other:?}"))),
        }
    }

    pub async fn get(&self, service: &str, id: &str) -> Result<Value, ClientError> {
        self.expect_record(Request::Get { service: service.into(), id: id.into() }).await
    }

    pub async fn create(&self, service: &str, data: Value) -> Result<Value, ClientError> {
        self.expect_record(Request::Create { service: service.into(), data }).await
    }

    pub async fn patch(&self, service: &str, id: &str, data: Value) -> Result<Value, ClientError> {
        self.expect_record(Request::Patch { service: service.into(), id: id.into(), data }).await
    }

    pub async fn remove(&self, service: &str, id: &str) -> Result<Value, ClientError> {
        self.expect_record(Request::Remove { service: service.into(), id: id.into() }).await
    }

    /// Call a custom route, e.g. `call("sessions", "prompt", Some(id), params)`.
    pub async fn call(
        &self,
        service: &str,
        route: &str,
        id: Option<&str>,
        params: Value,
    ) -> Result<Value, ClientError> {
        self.expect_record(Request::Call {
            service: service.into(),
            route: route.into(),
            id: id.map(str::to_string),
            params,
        })
        .await
    }

    pub async fn subscribe(&self, channels: Vec<String>) -> Result<(), ClientError> {
        match self.request(Request::Subscribe { channels }).await? {
            Response::Subscribed { .. } | Response::Ok => Ok(()),
            Response::Error { error } => Err(error.into()),
            other => Err(ClientError::Handshake(format!("unexpected response {other:?}"))),
        }
    }
}
