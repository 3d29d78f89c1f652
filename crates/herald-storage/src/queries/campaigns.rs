// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign rows.

use chrono::{DateTime, Utc};
use herald_core::clock::format_timestamp;
use herald_core::{Campaign, CampaignStatus, HeraldError};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err, parse_enum, parse_ts};

const COLUMNS: &str = "id, name, template, status, created_at, completed_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    let status: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let completed_at: Option<String> = row.get(5)?;
    Ok(Campaign {
        id: row.get(0)?,
        name: row.get(1)?,
        template: row.get(2)?,
        status: parse_enum(3, &status)?,
        created_at: parse_ts(4, &created_at)?,
        completed_at: completed_at.map(|s| parse_ts(5, &s)).transpose()?,
    })
}

pub async fn insert_campaign(db: &Database, campaign: &Campaign) -> Result<(), HeraldError> {
    let c = campaign.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO campaigns (id, name, template, status, created_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    c.id,
                    c.name,
                    c.template,
                    c.status.to_string(),
                    format_timestamp(&c.created_at),
                    c.completed_at.as_ref().map(format_timestamp),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_campaign(db: &Database, id: &str) -> Result<Option<Campaign>, HeraldError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM campaigns WHERE id = ?1"),
                params![id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Most recently created campaign, optionally restricted to one status.
///
/// Ties on `created_at` fall back to insertion order.
pub async fn latest_campaign(
    db: &Database,
    status: Option<CampaignStatus>,
) -> Result<Option<Campaign>, HeraldError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM campaigns
                     WHERE ?1 IS NULL OR status = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ),
                params![status],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_campaigns(db: &Database, limit: u32) -> Result<Vec<Campaign>, HeraldError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Campaign>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM campaigns ORDER BY created_at DESC, rowid DESC LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map(params![limit], from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn running_campaign_ids(db: &Database) -> Result<Vec<String>, HeraldError> {
    db.connection()
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt =
                conn.prepare("SELECT id FROM campaigns WHERE status = 'running' ORDER BY rowid")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

/// Persist a status change. Finished statuses stamp `completed_at`, others clear it.
pub async fn set_status(
    db: &Database,
    id: &str,
    status: CampaignStatus,
    at: DateTime<Utc>,
) -> Result<(), HeraldError> {
    let id_owned = id.to_string();
    let completed_at = status.is_finished().then(|| format_timestamp(&at));
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE campaigns SET status = ?1, completed_at = ?2 WHERE id = ?3",
                params![status.to_string(), completed_at, id_owned],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(HeraldError::CampaignNotFound(id.to_string()));
    }
    Ok(())
}

/// Delete a campaign; its contacts go with it through the cascade.
pub async fn delete_campaign(db: &Database, id: &str) -> Result<bool, HeraldError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| conn.execute("DELETE FROM campaigns WHERE id = ?1", params![id]))
        .await
        .map(|n| n > 0)
        .map_err(map_tr_err)
}
