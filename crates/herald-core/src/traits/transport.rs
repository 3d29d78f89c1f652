// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapter traits for the chat network.
//!
//! The network is consumed as an opaque capability: open an authenticated
//! session, receive its lifecycle events on a bounded channel, and drive
//! sends, presence, existence probes, and read receipts through the session.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::HeraldError;
use crate::traits::adapter::PluginAdapter;
use crate::traits::keystore::KeyStore;
use crate::types::{Address, MessageId, MessageRef, Presence, TransportEvent};

/// Credential material handed to the transport when opening a session.
#[derive(Clone)]
pub struct AuthState {
    /// The primary credential set (opaque to Herald).
    pub credentials: serde_json::Value,
    /// Auxiliary key material, readable on demand by the transport.
    pub keys: Arc<dyn KeyStore>,
}

/// An open session plus the receiving half of its event queue.
pub struct TransportLink {
    pub session: Arc<dyn TransportSession>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Factory for transport sessions.
#[async_trait]
pub trait TransportAdapter: PluginAdapter {
    /// A brand-new credential set, used when none is persisted.
    fn fresh_credentials(&self) -> serde_json::Value;

    /// Open a session. Events for the session are delivered on the returned
    /// link's receiver until the session closes.
    async fn open(&self, auth: AuthState) -> Result<TransportLink, HeraldError>;
}

/// Operations on one open transport session.
#[async_trait]
pub trait TransportSession: Send + Sync {
    /// Deliver a text message.
    async fn send_text(&self, to: &Address, text: &str) -> Result<MessageId, HeraldError>;

    /// Advertise presence, either globally (`to = None`) or toward one chat.
    async fn set_presence(&self, presence: Presence, to: Option<&Address>)
    -> Result<(), HeraldError>;

    /// Whether the address is a registered recipient on the network.
    async fn probe_exists(&self, address: &Address) -> Result<bool, HeraldError>;

    /// Send a read receipt for a received message.
    async fn mark_read(&self, message: &MessageRef) -> Result<(), HeraldError>;

    /// Invalidate the session server-side. The transport follows up with a
    /// logged-out close event.
    async fn logout(&self) -> Result<(), HeraldError>;

    /// Tear the session down locally without logging out.
    async fn end(&self);
}
