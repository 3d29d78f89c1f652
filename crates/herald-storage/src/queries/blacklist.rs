// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opt-out blacklist. Phones are stored as bare digits.

use chrono::{DateTime, Utc};
use herald_core::HeraldError;
use herald_core::clock::format_timestamp;
use herald_core::types::BlacklistEntry;
use rusqlite::params;

use super::phone_digits;
use crate::database::{Database, map_tr_err, parse_ts};

pub async fn is_blacklisted(db: &Database, phone: &str) -> Result<bool, HeraldError> {
    let digits = phone_digits(phone);
    if digits.is_empty() {
        return Ok(false);
    }
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM blacklist WHERE phone = ?1)",
                params![digits],
                |row| row.get::<_, bool>(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or refresh an entry. Re-adding a phone updates its reason.
pub async fn add(
    db: &Database,
    phone: &str,
    reason: &str,
    at: DateTime<Utc>,
) -> Result<(), HeraldError> {
    let digits = phone_digits(phone);
    if digits.is_empty() {
        return Err(HeraldError::InvalidPhone(phone.to_string()));
    }
    let reason = reason.to_string();
    let created_at = format_timestamp(&at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO blacklist (phone, reason, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(phone) DO UPDATE SET reason = excluded.reason",
                params![digits, reason, created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list(db: &Database) -> Result<Vec<BlacklistEntry>, HeraldError> {
    db.connection()
        .call(|conn| -> Result<Vec<BlacklistEntry>, rusqlite::Error> {
            let mut stmt = conn
                .prepare("SELECT phone, reason, created_at FROM blacklist ORDER BY created_at")?;
            let entries = stmt
                .query_map([], |row| {
                    let created_at: String = row.get(2)?;
                    Ok(BlacklistEntry {
                        phone: row.get(0)?,
                        reason: row.get(1)?,
                        created_at: parse_ts(2, &created_at)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}
