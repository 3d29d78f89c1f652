// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the store, the transport boundary, and the scheduler.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::HeraldError;

/// Unique identifier for a message accepted by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Storage,
}

// --- Campaigns and contacts ---

/// Lifecycle of a campaign as persisted in the store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Running,
    Paused,
    Completed,
    Stopped,
}

impl CampaignStatus {
    /// Completed and stopped campaigns carry a `completed_at` stamp.
    pub fn is_finished(self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Stopped)
    }
}

/// Delivery status of one contact row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Pending,
    Sent,
    Failed,
    Invalid,
    Blacklisted,
}

impl ContactStatus {
    /// Every terminal status. All of them count toward the daily cap.
    pub const TERMINAL: [ContactStatus; 4] = [
        ContactStatus::Sent,
        ContactStatus::Failed,
        ContactStatus::Invalid,
        ContactStatus::Blacklisted,
    ];

    /// Statuses that count as completed volume for adaptive cap growth.
    pub const VOLUME: [ContactStatus; 2] = [ContactStatus::Sent, ContactStatus::Failed];

    pub fn is_terminal(self) -> bool {
        self != ContactStatus::Pending
    }
}

/// Per-row personalization data keyed by variable name.
pub type ContactVariables = BTreeMap<String, serde_json::Value>;

/// A batch outbound job bound to one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub template: String,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One recipient row within a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub campaign_id: String,
    pub phone: String,
    pub variables: ContactVariables,
    pub status: ContactStatus,
    /// Timestamp of the terminal outcome, if any.
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// A contact row before it is persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NewContact {
    pub phone: String,
    pub variables: ContactVariables,
}

/// A phone that must never be messaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub phone: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregate contact counts for one campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCounts {
    pub total: u64,
    pub pending: u64,
    pub sent: u64,
    pub failed: u64,
    pub invalid: u64,
    pub blacklisted: u64,
}

impl ContactCounts {
    /// Failed, invalid, and blacklisted combined, as shown to operators.
    pub fn unsuccessful(&self) -> u64 {
        self.failed + self.invalid + self.blacklisted
    }

    /// Terminal rows plus pending rows. Always equals `total` for a consistent store.
    pub fn accounted(&self) -> u64 {
        self.pending + self.sent + self.unsuccessful()
    }
}

// --- Transport boundary ---

/// A normalized recipient address: the digits of a phone number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Normalize a raw phone string by keeping only ASCII digits.
    ///
    /// Fails when nothing numeric is left.
    pub fn from_phone(raw: &str) -> Result<Self, HeraldError> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(HeraldError::InvalidPhone(raw.to_string()));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Presence states the transport can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Composing,
    Paused,
    Available,
    Unavailable,
}

/// Opaque reference to a received message, used for read receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: String,
    /// Transport-specific address of the chat the message arrived in.
    pub remote: String,
}

/// A text message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundText {
    pub message_ref: MessageRef,
    pub text: Option<String>,
    pub is_own: bool,
}

impl InboundText {
    /// Sender phone digits, taken from the part of the remote address before `@`.
    pub fn sender_phone(&self) -> String {
        let local = self
            .message_ref
            .remote
            .split('@')
            .next()
            .unwrap_or_default();
        local.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

/// Why the transport closed a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason {
    pub status_code: Option<u16>,
    pub message: String,
}

/// A change to one persisted credential key. `None` deletes the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyUpdate {
    pub key: String,
    pub value: Option<serde_json::Value>,
}

/// Lifecycle and data events emitted by an open transport session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A pairing payload must be shown to the operator.
    PairingCode(String),
    /// The session is authenticated and usable.
    Opened,
    /// The session is gone.
    Closed(CloseReason),
    /// The primary credential set changed and must be persisted.
    CredentialsUpdated(serde_json::Value),
    /// Auxiliary key material changed.
    KeysUpdated(Vec<KeyUpdate>),
    /// An inbound text message.
    Message(InboundText),
}

/// Connection Manager state as observed by the scheduler and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Pairing,
    Connected,
    /// Absorbing: the process must terminate.
    Fatal,
}
