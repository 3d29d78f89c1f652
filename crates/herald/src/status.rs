// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `herald status`, `herald history`, and `herald blacklist list`.
//!
//! Everything here is read from the store, so it works whether or not a
//! serving process is running. `--json` prints structured output for
//! scripting; `--plain` or a non-TTY stdout disables colors.

use std::io::IsTerminal;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use colored::Colorize;
use herald_config::model::HeraldConfig;
use herald_connection::pairing::render_qr;
use herald_connection::{OWNER_KEY, PAIRING_KEY};
use herald_core::types::BlacklistEntry;
use herald_core::{CampaignStatus, HeraldError, KeyStore};
use herald_dispatch::report::{self, CampaignSummary, HISTORY_LIMIT, LogLevel, Progress};
use herald_dispatch::ContactQueue;
use herald_pacing::strategy_from_config;
use herald_storage::SqliteStorage;
use serde::Serialize;

/// Store-derived status for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StoreStatus {
    /// Instance id of the process holding the session, if any.
    pub owner: Option<String>,
    /// Pairing payload while the serving process waits for a scan.
    pub pairing_payload: Option<String>,
    #[serde(flatten)]
    pub progress: Progress,
}

pub async fn collect_status(
    config: &HeraldConfig,
    storage: Arc<SqliteStorage>,
    now: DateTime<Utc>,
) -> Result<StoreStatus, HeraldError> {
    let queue = ContactQueue::new(storage.clone());
    let cap = strategy_from_config(&config.pacing);
    let progress = report::progress(storage.as_ref(), &queue, cap.as_ref(), now).await?;
    Ok(StoreStatus {
        owner: storage.read_key(OWNER_KEY).await?,
        pairing_payload: storage.read_key(PAIRING_KEY).await?,
        progress,
    })
}

fn use_color(plain: bool) -> bool {
    !plain && std::io::stdout().is_terminal()
}

fn to_json<T: Serialize>(value: &T) -> Result<String, HeraldError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| HeraldError::Internal(format!("failed to serialize output: {e}")))
}

fn paint(text: &str, status: CampaignStatus, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    match status {
        CampaignStatus::Running => text.green().to_string(),
        CampaignStatus::Paused => text.yellow().to_string(),
        CampaignStatus::Completed => text.cyan().to_string(),
        CampaignStatus::Stopped => text.red().to_string(),
    }
}

/// Render a status report as terminal text.
pub fn render_status(status: &StoreStatus, color: bool) -> String {
    let mut out = String::new();
    out.push_str("\n  herald status\n");
    out.push_str(&format!("  {}\n", "-".repeat(50)));

    let session = match (&status.pairing_payload, &status.owner) {
        (Some(_), _) => "waiting for pairing".to_string(),
        (None, Some(owner)) => format!("held by instance {owner}"),
        (None, None) => "no serving process".to_string(),
    };
    out.push_str(&format!("  Session:   {session}\n"));

    let progress = &status.progress;
    out.push_str(&format!(
        "  Today:     {}/{} messages\n",
        progress.daily_count, progress.daily_cap
    ));

    match &progress.campaign {
        Some(summary) => {
            let label = summary.campaign.status.to_string();
            out.push_str(&format!(
                "  Campaign:  {} [{}]\n",
                summary.campaign.name,
                paint(&label, summary.campaign.status, color)
            ));
            out.push_str(&format!(
                "             {} total, {} sent, {} failed, {} pending\n",
                summary.total(),
                summary.sent(),
                summary.failed(),
                summary.pending()
            ));
        }
        None => out.push_str("  Campaign:  none\n"),
    }

    if !progress.logs.is_empty() {
        out.push_str("\n  Recent outcomes\n");
        for line in &progress.logs {
            let at = line
                .at
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "--:--:--".to_string());
            let message = match (color, line.level) {
                (false, _) => line.message.clone(),
                (true, LogLevel::Success) => line.message.green().to_string(),
                (true, LogLevel::Error) => line.message.red().to_string(),
                (true, LogLevel::Warning) => line.message.yellow().to_string(),
            };
            out.push_str(&format!("    {at}  {message}\n"));
        }
    }

    if let Some(payload) = &status.pairing_payload {
        out.push_str("\n  Scan this code from the phone app:\n");
        out.push_str(&render_qr(payload).unwrap_or_else(|| payload.clone()));
        out.push('\n');
    }
    out
}

pub async fn run_status(
    config: &HeraldConfig,
    storage: Arc<SqliteStorage>,
    json: bool,
    plain: bool,
) -> Result<(), HeraldError> {
    let status = collect_status(config, storage, Utc::now()).await?;
    if json {
        println!("{}", to_json(&status)?);
    } else {
        println!("{}", render_status(&status, use_color(plain)));
    }
    Ok(())
}

pub fn render_history(history: &[CampaignSummary], color: bool) -> String {
    if history.is_empty() {
        return "No campaigns yet.\n".to_string();
    }
    let mut out = format!(
        "{:<20} {:<10} {:>6} {:>6} {:>6} {:>7}  {}\n",
        "CREATED", "STATUS", "TOTAL", "SENT", "FAILED", "PENDING", "NAME"
    );
    for summary in history {
        let status = format!("{:<10}", summary.campaign.status.to_string());
        out.push_str(&format!(
            "{:<20} {} {:>6} {:>6} {:>6} {:>7}  {}\n",
            summary.campaign.created_at.format("%Y-%m-%d %H:%M"),
            paint(&status, summary.campaign.status, color),
            summary.total(),
            summary.sent(),
            summary.failed(),
            summary.pending(),
            summary.campaign.name
        ));
    }
    out
}

pub async fn run_history(
    storage: Arc<SqliteStorage>,
    json: bool,
    plain: bool,
) -> Result<(), HeraldError> {
    let history = report::history(storage.as_ref(), HISTORY_LIMIT).await?;
    if json {
        println!("{}", to_json(&history)?);
    } else {
        print!("{}", render_history(&history, use_color(plain)));
    }
    Ok(())
}

pub fn render_blacklist(entries: &[BlacklistEntry]) -> String {
    if entries.is_empty() {
        return "Blacklist is empty.\n".to_string();
    }
    entries
        .iter()
        .map(|e| {
            format!(
                "{:<16} {:<14} {}\n",
                e.phone,
                e.reason,
                e.created_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use herald_core::{Campaign, ContactCounts};

    use super::*;
    use herald_dispatch::report::LogLine;

    fn summary(status: CampaignStatus) -> CampaignSummary {
        CampaignSummary {
            campaign: Campaign {
                id: "c-1".into(),
                name: "Spring promo".into(),
                template: "Hi".into(),
                status,
                created_at: Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap(),
                completed_at: None,
            },
            counts: ContactCounts {
                total: 10,
                pending: 4,
                sent: 5,
                failed: 0,
                invalid: 1,
                blacklisted: 0,
            },
        }
    }

    fn status(pairing: Option<&str>, owner: Option<&str>) -> StoreStatus {
        StoreStatus {
            owner: owner.map(str::to_string),
            pairing_payload: pairing.map(str::to_string),
            progress: Progress {
                daily_count: 5,
                daily_cap: 40,
                campaign: Some(summary(CampaignStatus::Running)),
                logs: vec![LogLine::reply_pause(
                    Utc.with_ymd_and_hms(2026, 3, 10, 9, 45, 0).unwrap(),
                )],
            },
        }
    }

    #[test]
    fn plain_status_lists_progress() {
        let text = render_status(&status(None, Some("inst-1")), false);
        assert!(text.contains("held by instance inst-1"));
        assert!(text.contains("5/40 messages"));
        assert!(text.contains("Spring promo [running]"));
        assert!(text.contains("10 total, 5 sent, 1 failed, 4 pending"));
        assert!(text.contains("09:45:00  Paused: a contact replied"));
        assert!(!text.contains("Scan this code"));
    }

    #[test]
    fn pairing_status_shows_the_code() {
        let text = render_status(&status(Some("2@payload"), Some("inst-1")), false);
        assert!(text.contains("waiting for pairing"));
        assert!(text.contains("Scan this code"));
    }

    #[test]
    fn history_table_has_one_row_per_campaign() {
        let text = render_history(
            &[summary(CampaignStatus::Completed), summary(CampaignStatus::Paused)],
            false,
        );
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).is_some_and(|l| l.contains("completed")));
        assert_eq!(render_history(&[], false), "No campaigns yet.\n");
    }

    #[test]
    fn status_json_flattens_progress() {
        let value = serde_json::to_value(status(None, None)).unwrap();
        assert_eq!(value["daily_cap"], 40);
        assert_eq!(value["owner"], serde_json::Value::Null);
        assert_eq!(value["campaign"]["counts"]["sent"], 5);
    }
}
