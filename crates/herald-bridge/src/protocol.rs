// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON frames exchanged with the transport sidecar.
//!
//! Herald -> sidecar:
//! ```json
//! {"type": "hello", "credentials": {...}}
//! {"type": "request", "id": 7, "op": "send_text", "to": "33600000001", "text": "Hi"}
//! {"type": "key_value", "id": "k-3", "value": "..."}
//! ```
//!
//! Sidecar -> Herald:
//! ```json
//! {"type": "response", "id": 7, "result": {"message_id": "ABC"}}
//! {"type": "response", "id": 8, "error": "rate limited"}
//! {"type": "event", "event": "closed", "status_code": 440, "message": "replaced"}
//! {"type": "key_get", "id": "k-3", "key": "pre-key-12"}
//! ```

use herald_core::types::{CloseReason, InboundText, KeyUpdate, MessageRef};
use herald_core::{Presence, TransportEvent};
use serde::{Deserialize, Serialize};

/// Frames Herald writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame of every connection.
    Hello { credentials: serde_json::Value },
    Request {
        id: u64,
        #[serde(flatten)]
        op: Request,
    },
    /// Answer to a [`ServerFrame::KeyGet`].
    KeyValue { id: String, value: Option<String> },
}

/// Session operations, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    SendText {
        to: String,
        text: String,
    },
    SetPresence {
        presence: Presence,
        #[serde(skip_serializing_if = "Option::is_none")]
        to: Option<String>,
    },
    ProbeExists {
        address: String,
    },
    MarkRead {
        message: MessageRef,
    },
    Logout,
}

/// Frames the sidecar writes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Response {
        id: u64,
        #[serde(default)]
        result: Option<serde_json::Value>,
        #[serde(default)]
        error: Option<String>,
    },
    Event {
        #[serde(flatten)]
        event: BridgeEvent,
    },
    /// The sidecar needs an auxiliary key from the store.
    KeyGet { id: String, key: String },
}

/// Session lifecycle and data events, tagged by `event`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    PairingCode {
        payload: String,
    },
    Opened,
    Closed {
        #[serde(default)]
        status_code: Option<u16>,
        #[serde(default)]
        message: String,
    },
    CredentialsUpdated {
        credentials: serde_json::Value,
    },
    KeysUpdated {
        updates: Vec<KeyUpdate>,
    },
    Message {
        message_ref: MessageRef,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        is_own: bool,
    },
}

impl From<BridgeEvent> for TransportEvent {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::PairingCode { payload } => TransportEvent::PairingCode(payload),
            BridgeEvent::Opened => TransportEvent::Opened,
            BridgeEvent::Closed {
                status_code,
                message,
            } => TransportEvent::Closed(CloseReason {
                status_code,
                message,
            }),
            BridgeEvent::CredentialsUpdated { credentials } => {
                TransportEvent::CredentialsUpdated(credentials)
            }
            BridgeEvent::KeysUpdated { updates } => TransportEvent::KeysUpdated(updates),
            BridgeEvent::Message {
                message_ref,
                text,
                is_own,
            } => TransportEvent::Message(InboundText {
                message_ref,
                text,
                is_own,
            }),
        }
    }
}

/// `result` of a `send_text` response.
#[derive(Debug, Deserialize)]
pub struct SendResult {
    pub message_id: String,
}

/// `result` of a `probe_exists` response.
#[derive(Debug, Deserialize)]
pub struct ProbeResult {
    pub exists: bool,
}
