// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store-level control for processes that do not own the transport session.
//!
//! The serving process notices campaign status changes on its next tick and
//! consumes `control:*` request keys from its idle watcher, so the CLI can
//! steer a running engine through the store alone.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use herald_core::{
    Address, Campaign, CampaignStatus, Clock, HeraldError, KeyStore, StorageAdapter,
};

use crate::import::{ColumnMapping, ImportRow, map_rows};

/// Request key: lift the daily cap for the rest of the day.
pub const FORCE_CONTINUE_KEY: &str = "control:force_continue";

/// Request key: end the session, wipe credentials, and pair again.
pub const RESET_SESSION_KEY: &str = "control:reset_session";

/// Request key: send one test message, JSON-encoded [`TestMessageRequest`].
pub const TEST_MESSAGE_KEY: &str = "control:test_message";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMessageRequest {
    pub phone: String,
    pub text: String,
}

/// Create a campaign with its contacts, then mark it running.
///
/// Contacts land before the campaign turns running, so a live dispatch loop
/// never sees it empty.
pub(crate) async fn insert_campaign(
    storage: &dyn StorageAdapter,
    now: chrono::DateTime<chrono::Utc>,
    name: &str,
    template: &str,
    rows: &[ImportRow],
    mapping: Option<&ColumnMapping>,
) -> Result<Campaign, HeraldError> {
    let contacts = map_rows(rows, mapping);
    let mut campaign = storage
        .create_campaign(name, template, CampaignStatus::Paused)
        .await?;
    let inserted = storage.insert_contacts(&campaign.id, &contacts).await?;
    storage
        .set_campaign_status(&campaign.id, CampaignStatus::Running, now)
        .await?;
    campaign.status = CampaignStatus::Running;
    info!(campaign_id = %campaign.id, name, contacts = inserted, "campaign created");
    Ok(campaign)
}

pub struct StoreControl {
    storage: Arc<dyn StorageAdapter>,
    keys: Arc<dyn KeyStore>,
    clock: Arc<dyn Clock>,
}

impl StoreControl {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        keys: Arc<dyn KeyStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            keys,
            clock,
        }
    }

    pub async fn create_campaign(
        &self,
        name: &str,
        template: &str,
        rows: &[ImportRow],
        mapping: Option<&ColumnMapping>,
    ) -> Result<Campaign, HeraldError> {
        insert_campaign(
            self.storage.as_ref(),
            self.clock.now(),
            name,
            template,
            rows,
            mapping,
        )
        .await
    }

    /// Pause every running campaign. Returns how many changed.
    pub async fn pause(&self) -> Result<u64, HeraldError> {
        self.set_running_to(CampaignStatus::Paused).await
    }

    /// Stop every running campaign. Returns how many changed.
    pub async fn stop(&self) -> Result<u64, HeraldError> {
        self.set_running_to(CampaignStatus::Stopped).await
    }

    async fn set_running_to(&self, status: CampaignStatus) -> Result<u64, HeraldError> {
        let now = self.clock.now();
        let ids = self.storage.running_campaign_ids().await?;
        for id in &ids {
            self.storage.set_campaign_status(id, status, now).await?;
            info!(campaign_id = %id, %status, "campaign status changed");
        }
        Ok(ids.len() as u64)
    }

    /// Set the latest campaign running unless it already finished.
    pub async fn resume(&self) -> Result<Campaign, HeraldError> {
        let mut campaign = self.latest_unfinished().await?;
        if campaign.status != CampaignStatus::Running {
            self.storage
                .set_campaign_status(&campaign.id, CampaignStatus::Running, self.clock.now())
                .await?;
            campaign.status = CampaignStatus::Running;
            info!(campaign_id = %campaign.id, "campaign resumed");
        }
        Ok(campaign)
    }

    /// Flip the latest campaign between running and paused.
    pub async fn toggle(&self) -> Result<Campaign, HeraldError> {
        let mut campaign = self.latest_unfinished().await?;
        let next = match campaign.status {
            CampaignStatus::Running => CampaignStatus::Paused,
            _ => CampaignStatus::Running,
        };
        self.storage
            .set_campaign_status(&campaign.id, next, self.clock.now())
            .await?;
        campaign.status = next;
        info!(campaign_id = %campaign.id, status = %next, "campaign toggled");
        Ok(campaign)
    }

    async fn latest_unfinished(&self) -> Result<Campaign, HeraldError> {
        match self.storage.latest_campaign().await? {
            Some(c) if !c.status.is_finished() => Ok(c),
            _ => Err(HeraldError::NoActiveCampaign),
        }
    }

    pub async fn delete_campaign(&self, id: &str) -> Result<bool, HeraldError> {
        self.storage.delete_campaign(id).await
    }

    /// Blacklist a phone and settle its pending contacts. Returns the number
    /// of contacts swept.
    pub async fn blacklist(&self, phone: &str, reason: &str) -> Result<u64, HeraldError> {
        let address = Address::from_phone(phone)?;
        self.storage
            .add_to_blacklist(address.as_str(), reason, self.clock.now())
            .await?;
        self.storage.blacklist_pending_contacts(address.as_str()).await
    }

    pub async fn request_force_continue(&self) -> Result<(), HeraldError> {
        self.request(FORCE_CONTINUE_KEY, &self.clock.now().to_rfc3339())
            .await
    }

    pub async fn request_reset_session(&self) -> Result<(), HeraldError> {
        self.request(RESET_SESSION_KEY, &self.clock.now().to_rfc3339())
            .await
    }

    pub async fn request_test_message(&self, phone: &str, text: &str) -> Result<(), HeraldError> {
        let address = Address::from_phone(phone)?;
        let request = TestMessageRequest {
            phone: address.to_string(),
            text: text.to_string(),
        };
        let encoded = serde_json::to_string(&request)
            .map_err(|e| HeraldError::Internal(format!("encode test message request: {e}")))?;
        self.request(TEST_MESSAGE_KEY, &encoded).await
    }

    async fn request(&self, key: &str, value: &str) -> Result<(), HeraldError> {
        self.keys.write_key(key, value).await?;
        info!(key, "control request written");
        Ok(())
    }
}
