// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport adapter for the Herald dispatch engine.
//!
//! The chat network itself is reached through an external sidecar process.
//! Herald speaks a small JSON protocol to it (see [`protocol`]): requests with
//! ids and matching responses, lifecycle and message events, and on-demand
//! key lookups served from the store.

pub mod protocol;
pub mod session;
pub mod transport;

pub use session::BridgeSession;
pub use transport::BridgeTransport;
