// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The contact queue: next unit of work and its outcome, backed by the store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use herald_core::{Contact, ContactStatus, HeraldError, StorageAdapter};
use herald_pacing::{DailyCapStrategy, day_bounds, previous_day_bounds};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct ContactQueue {
    storage: Arc<dyn StorageAdapter>,
}

impl ContactQueue {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Some pending contact of the campaign, or `None` once exhausted.
    pub async fn next_pending(&self, campaign_id: &str) -> Result<Option<Contact>, HeraldError> {
        self.storage.next_pending_contact(campaign_id).await
    }

    pub async fn is_blacklisted(&self, phone: &str) -> Result<bool, HeraldError> {
        self.storage.is_blacklisted(phone).await
    }

    /// Move a pending contact to a terminal status, stamped with `at`.
    ///
    /// Returns `false` when the contact had already left `pending`, for
    /// example because an opt-out swept it meanwhile.
    pub async fn mark_outcome(
        &self,
        contact: &Contact,
        status: ContactStatus,
        error_message: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, HeraldError> {
        let changed = self
            .storage
            .mark_contact_outcome(contact.id, status, error_message, at)
            .await?;
        if !changed {
            debug!(contact_id = contact.id, status = %status, "contact already settled");
            return Ok(false);
        }
        match status {
            ContactStatus::Sent => info!(
                contact_id = contact.id,
                phone = %contact.phone,
                "message sent"
            ),
            _ => warn!(
                contact_id = contact.id,
                phone = %contact.phone,
                status = %status,
                error = error_message.unwrap_or_default(),
                "contact not delivered"
            ),
        }
        Ok(true)
    }

    pub async fn campaign_exhausted(&self, campaign_id: &str) -> Result<bool, HeraldError> {
        Ok(self.next_pending(campaign_id).await?.is_none())
    }

    /// Terminal outcomes of every status stamped on the UTC day of `now`.
    pub async fn today_count(&self, now: DateTime<Utc>) -> Result<u64, HeraldError> {
        let (start, end) = day_bounds(now);
        self.storage
            .count_outcomes_between(&ContactStatus::TERMINAL, start, end)
            .await
    }

    /// Sent and failed outcomes on the UTC day before `now`.
    pub async fn previous_day_volume(&self, now: DateTime<Utc>) -> Result<u64, HeraldError> {
        let (start, end) = previous_day_bounds(now);
        self.storage
            .count_outcomes_between(&ContactStatus::VOLUME, start, end)
            .await
    }

    /// Today's cap under `strategy`.
    pub async fn daily_cap(
        &self,
        strategy: &dyn DailyCapStrategy,
        now: DateTime<Utc>,
    ) -> Result<u64, HeraldError> {
        let previous = if strategy.uses_history() {
            self.previous_day_volume(now).await?
        } else {
            0
        };
        Ok(strategy.cap(previous))
    }
}
