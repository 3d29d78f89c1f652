// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Herald integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a real chat transport.
//!
//! # Components
//!
//! - [`MockTransport`] - Scriptable transport with captured sends and presence
//! - [`MemoryKeyStore`] - In-memory credential store
//! - [`ManualClock`] - Wall clock moved by the test
//! - [`TestHarness`] - Temp store, mock transport, connection manager, engine

pub mod clock;
pub mod harness;
pub mod memory_keys;
pub mod mock_transport;

pub use clock::ManualClock;
pub use harness::{TestHarness, test_config, wait_for_state};
pub use memory_keys::MemoryKeyStore;
pub use mock_transport::{MockTransport, SentMessage, close_reason};
