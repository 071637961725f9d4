// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agor-adapters: facades over the external systems the daemon drives —
//! agent SDKs, Unix account plumbing, chat-gateway connectors, and PTYs.

pub mod gateway;
pub mod subprocess;
pub mod terminal;
pub mod tool;
pub mod unix;

pub use gateway::{
    GatewayConnector, GatewayConnectorError, InboundCallback, InboundPost, OutboundMessage,
};
pub use terminal::{zellij_tab, Terminal, TerminalKind, TerminalSpawn};
pub use tool::{
    NormalizeCtx, PromptCtx, PromptOutcome, StopOutcome, StreamCallbacks, ToolAdapter,
    ToolFailure, ToolRegistry,
};
pub use unix::{NoopRunner, SudoRunner, SystemRunner, UnixCommandOutput, UnixRunner};

#[cfg(any(test, feature = "test-support"))]
pub use gateway::FakeConnector;
#[cfg(any(test, feature = "test-support"))]
pub use tool::{FakeScript, FakeToolAdapter, RecordingCallbacks};
#[cfg(any(test, feature = "test-support"))]
pub use unix::FakeUnixHost;
