// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC protocol for daemon communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.
//! Clients open a connection, send `Hello`, then issue service calls;
//! subscriptions turn the same connection into an event push stream.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod frame;
mod payload;
mod query;
mod request;
mod response;

pub use client::{ClientError, DaemonClient};
pub use frame::{decode, encode, read_message, write_message, ProtocolError, MAX_FRAME_LEN};
pub use payload::{
    ExecutorAction, ExecutorError, ExecutorPayload, ExecutorResult, GatewayDispatch,
    GitCloneParams, PostMessage, PromptParams, SyncRepoParams, SyncUserParams, SyncWorktreeParams,
    TerminalMode, WorktreeAddParams, WorktreeCleanParams, WorktreeRemoveParams, ZellijAttachParams,
    ZellijTabParams,
};
pub use query::{FindQuery, SortDirection, MAX_QUERY_LIMIT};
pub use request::Request;
pub use response::{DaemonStatus, LoginUser, Response};

#[cfg(test)]
mod property_tests;
