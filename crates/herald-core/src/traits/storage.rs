// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for campaign, contact, and blacklist persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::HeraldError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Campaign, CampaignStatus, Contact, ContactCounts, ContactStatus, NewContact};

/// Adapter for the persistent store.
///
/// The store is the source of truth for campaigns and contacts, so a process
/// restart loses only in-memory scheduler state.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), HeraldError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), HeraldError>;

    // --- Campaigns ---

    /// Create a campaign with the given initial status.
    async fn create_campaign(
        &self,
        name: &str,
        template: &str,
        status: CampaignStatus,
    ) -> Result<Campaign, HeraldError>;

    /// Insert contact rows as `pending`. Returns the number inserted.
    async fn insert_contacts(
        &self,
        campaign_id: &str,
        contacts: &[NewContact],
    ) -> Result<u64, HeraldError>;

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>, HeraldError>;

    /// The most recently created campaign regardless of status.
    async fn latest_campaign(&self) -> Result<Option<Campaign>, HeraldError>;

    /// The most recently created campaign with status `running`.
    async fn latest_running_campaign(&self) -> Result<Option<Campaign>, HeraldError>;

    /// Most recent campaigns first.
    async fn list_campaigns(&self, limit: u32) -> Result<Vec<Campaign>, HeraldError>;

    /// Ids of every campaign currently `running`.
    async fn running_campaign_ids(&self) -> Result<Vec<String>, HeraldError>;

    /// Persist a status transition. Completed and stopped stamp `completed_at`.
    async fn set_campaign_status(
        &self,
        id: &str,
        status: CampaignStatus,
        at: DateTime<Utc>,
    ) -> Result<(), HeraldError>;

    /// Delete a campaign and its contacts. Returns whether it existed.
    async fn delete_campaign(&self, id: &str) -> Result<bool, HeraldError>;

    // --- Contacts ---

    /// Some pending contact of the campaign, or `None` when exhausted.
    async fn next_pending_contact(&self, campaign_id: &str)
    -> Result<Option<Contact>, HeraldError>;

    /// Atomically move a pending contact to a terminal status.
    ///
    /// Returns `false` (and changes nothing) if the contact is not pending.
    async fn mark_contact_outcome(
        &self,
        contact_id: i64,
        status: ContactStatus,
        error_message: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, HeraldError>;

    /// Count contacts in `statuses` whose outcome timestamp is in `[start, end)`.
    async fn count_outcomes_between(
        &self,
        statuses: &[ContactStatus],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, HeraldError>;

    async fn campaign_counts(&self, campaign_id: &str) -> Result<ContactCounts, HeraldError>;

    /// Terminal contacts of a campaign, most recent outcome first.
    async fn recent_outcomes(
        &self,
        campaign_id: &str,
        limit: u32,
    ) -> Result<Vec<Contact>, HeraldError>;

    // --- Blacklist ---

    async fn is_blacklisted(&self, phone: &str) -> Result<bool, HeraldError>;

    /// Insert or refresh a blacklist entry.
    async fn add_to_blacklist(
        &self,
        phone: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), HeraldError>;

    /// Mark every pending contact with this phone as blacklisted without an
    /// outcome timestamp, so opt-outs do not count toward the daily cap.
    /// Returns the number of contacts changed.
    async fn blacklist_pending_contacts(&self, phone: &str) -> Result<u64, HeraldError>;
}
