// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress and history views over the store.
//!
//! These only read the store, so the CLI can build them from another process.

use chrono::{DateTime, Utc};
use herald_core::{Campaign, Contact, ContactCounts, ContactStatus, HeraldError, StorageAdapter};
use herald_pacing::DailyCapStrategy;
use serde::Serialize;
use strum::Display;

use crate::queue::ContactQueue;

/// Number of outcomes shown in a status report.
pub const RECENT_OUTCOMES: u32 = 10;

/// Number of campaigns shown in the history.
pub const HISTORY_LIMIT: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignSummary {
    pub campaign: Campaign,
    pub counts: ContactCounts,
}

impl CampaignSummary {
    pub fn total(&self) -> u64 {
        self.counts.total
    }

    pub fn sent(&self) -> u64 {
        self.counts.sent
    }

    /// Failed, invalid, and blacklisted together.
    pub fn failed(&self) -> u64 {
        self.counts.unsuccessful()
    }

    pub fn pending(&self) -> u64 {
        self.counts.pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Success,
    Error,
    Warning,
}

/// One line of the rolling outcome log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogLine {
    pub phone: String,
    pub at: Option<DateTime<Utc>>,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn from_contact(contact: &Contact) -> Self {
        let (level, message) = match contact.status {
            ContactStatus::Sent => (LogLevel::Success, format!("Message sent to {}", contact.phone)),
            status => (
                LogLevel::Error,
                format!(
                    "{} {}: {}",
                    status.to_string().to_uppercase(),
                    contact.phone,
                    contact.error_message.as_deref().unwrap_or("-")
                ),
            ),
        };
        Self {
            phone: contact.phone.clone(),
            at: contact.sent_at,
            level,
            message,
        }
    }

    pub fn reply_pause(at: DateTime<Utc>) -> Self {
        Self {
            phone: String::new(),
            at: Some(at),
            level: LogLevel::Warning,
            message: "Paused: a contact replied".to_string(),
        }
    }
}

/// Store-derived progress: daily usage, latest campaign, recent outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub daily_count: u64,
    pub daily_cap: u64,
    pub campaign: Option<CampaignSummary>,
    pub logs: Vec<LogLine>,
}

pub async fn summarize(
    storage: &dyn StorageAdapter,
    campaign: Campaign,
) -> Result<CampaignSummary, HeraldError> {
    let counts = storage.campaign_counts(&campaign.id).await?;
    Ok(CampaignSummary { campaign, counts })
}

pub async fn progress(
    storage: &dyn StorageAdapter,
    queue: &ContactQueue,
    cap: &dyn DailyCapStrategy,
    now: DateTime<Utc>,
) -> Result<Progress, HeraldError> {
    let daily_count = queue.today_count(now).await?;
    let daily_cap = queue.daily_cap(cap, now).await?;

    let (campaign, logs) = match storage.latest_campaign().await? {
        Some(campaign) => {
            let recent = storage
                .recent_outcomes(&campaign.id, RECENT_OUTCOMES)
                .await?;
            let logs = recent.iter().map(LogLine::from_contact).collect();
            (Some(summarize(storage, campaign).await?), logs)
        }
        None => (None, Vec::new()),
    };

    Ok(Progress {
        daily_count,
        daily_cap,
        campaign,
        logs,
    })
}

/// The most recent campaigns with their totals, newest first.
pub async fn history(
    storage: &dyn StorageAdapter,
    limit: u32,
) -> Result<Vec<CampaignSummary>, HeraldError> {
    let campaigns = storage.list_campaigns(limit).await?;
    let mut summaries = Vec::with_capacity(campaigns.len());
    for campaign in campaigns {
        summaries.push(summarize(storage, campaign).await?);
    }
    Ok(summaries)
}
