// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod keystore;
pub mod storage;
pub mod transport;

pub use adapter::PluginAdapter;
pub use keystore::KeyStore;
pub use storage::StorageAdapter;
pub use transport::{AuthState, TransportAdapter, TransportLink, TransportSession};
