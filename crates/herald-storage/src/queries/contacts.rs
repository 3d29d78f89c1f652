// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact rows: bulk insert, the pending queue, and outcome bookkeeping.

use chrono::{DateTime, Utc};
use herald_core::clock::format_timestamp;
use herald_core::types::ContactVariables;
use herald_core::{Contact, ContactCounts, ContactStatus, HeraldError, NewContact};
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use super::phone_digits;
use crate::database::{Database, map_tr_err, parse_enum, parse_ts};

/// Rows per insert transaction.
pub const INSERT_CHUNK: usize = 500;

const COLUMNS: &str = "id, campaign_id, phone, variables, status, sent_at, error_message";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    let variables: String = row.get(3)?;
    let status: String = row.get(4)?;
    let sent_at: Option<String> = row.get(5)?;
    let variables: ContactVariables = serde_json::from_str(&variables).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Contact {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        phone: row.get(2)?,
        variables,
        status: parse_enum(4, &status)?,
        sent_at: sent_at.map(|s| parse_ts(5, &s)).transpose()?,
        error_message: row.get(6)?,
    })
}

/// Insert contacts as `pending`, `INSERT_CHUNK` rows per transaction.
pub async fn insert_contacts(
    db: &Database,
    campaign_id: &str,
    contacts: &[NewContact],
) -> Result<u64, HeraldError> {
    let mut rows = Vec::with_capacity(contacts.len());
    for contact in contacts {
        let variables =
            serde_json::to_string(&contact.variables).map_err(|e| HeraldError::Storage {
                source: Box::new(e),
            })?;
        rows.push((contact.phone.clone(), phone_digits(&contact.phone), variables));
    }

    let mut inserted = 0u64;
    for chunk in rows.chunks(INSERT_CHUNK) {
        let campaign_id = campaign_id.to_string();
        let chunk = chunk.to_vec();
        inserted += db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare_cached(
                        "INSERT INTO contacts (campaign_id, phone, phone_digits, variables)
                         VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for (phone, digits, variables) in &chunk {
                        stmt.execute(params![campaign_id, phone, digits, variables])?;
                    }
                }
                tx.commit()?;
                Ok(chunk.len() as u64)
            })
            .await
            .map_err(map_tr_err)?;
    }
    Ok(inserted)
}

/// Some pending contact of the campaign. Lowest id first, though callers
/// must not rely on the order.
pub async fn next_pending(db: &Database, campaign_id: &str) -> Result<Option<Contact>, HeraldError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM contacts
                     WHERE campaign_id = ?1 AND status = 'pending'
                     ORDER BY id LIMIT 1"
                ),
                params![campaign_id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Move a pending contact to a terminal status in one statement.
///
/// Returns `false` if the contact was no longer pending.
pub async fn mark_outcome(
    db: &Database,
    contact_id: i64,
    status: ContactStatus,
    error_message: Option<&str>,
    at: DateTime<Utc>,
) -> Result<bool, HeraldError> {
    if !status.is_terminal() {
        return Err(HeraldError::Internal(format!(
            "contact {contact_id} cannot transition to {status}"
        )));
    }
    let error_message = error_message.map(str::to_string);
    let sent_at = format_timestamp(&at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE contacts SET status = ?1, sent_at = ?2, error_message = ?3
                 WHERE id = ?4 AND status = 'pending'",
                params![status.to_string(), sent_at, error_message, contact_id],
            )
        })
        .await
        .map(|changed| changed > 0)
        .map_err(map_tr_err)
}

/// Count contacts with one of `statuses` whose outcome is in `[start, end)`.
pub async fn count_outcomes_between(
    db: &Database,
    statuses: &[ContactStatus],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<u64, HeraldError> {
    if statuses.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; statuses.len()].join(", ");
    let sql = format!(
        "SELECT COUNT(*) FROM contacts
         WHERE status IN ({placeholders}) AND sent_at >= ? AND sent_at < ?"
    );
    let mut bind: Vec<String> = statuses.iter().map(ToString::to_string).collect();
    bind.push(format_timestamp(&start));
    bind.push(format_timestamp(&end));
    db.connection()
        .call(move |conn| {
            conn.query_row(&sql, params_from_iter(bind.iter()), |row| {
                row.get::<_, i64>(0)
            })
        })
        .await
        .map(|n| n as u64)
        .map_err(map_tr_err)
}

pub async fn campaign_counts(db: &Database, campaign_id: &str) -> Result<ContactCounts, HeraldError> {
    let campaign_id = campaign_id.to_string();
    let grouped = db
        .connection()
        .call(move |conn| -> Result<Vec<(String, i64)>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM contacts WHERE campaign_id = ?1 GROUP BY status",
            )?;
            let rows = stmt
                .query_map(params![campaign_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)?;

    let mut counts = ContactCounts::default();
    for (status, n) in grouped {
        let n = n as u64;
        counts.total += n;
        match status.parse::<ContactStatus>() {
            Ok(ContactStatus::Pending) => counts.pending += n,
            Ok(ContactStatus::Sent) => counts.sent += n,
            Ok(ContactStatus::Failed) => counts.failed += n,
            Ok(ContactStatus::Invalid) => counts.invalid += n,
            Ok(ContactStatus::Blacklisted) => counts.blacklisted += n,
            Err(_) => {
                return Err(HeraldError::Internal(format!(
                    "unknown contact status `{status}` in store"
                )));
            }
        }
    }
    Ok(counts)
}

/// Terminal contacts of a campaign, most recent outcome first. Rows without
/// an outcome timestamp (opt-outs) sort last.
pub async fn recent_outcomes(
    db: &Database,
    campaign_id: &str,
    limit: u32,
) -> Result<Vec<Contact>, HeraldError> {
    let campaign_id = campaign_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Contact>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM contacts
                 WHERE campaign_id = ?1 AND status != 'pending'
                 ORDER BY sent_at IS NULL, sent_at DESC, id DESC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![campaign_id, limit], from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Opt-out sweep: every pending contact with this phone becomes blacklisted.
pub async fn blacklist_pending(db: &Database, phone: &str) -> Result<u64, HeraldError> {
    let digits = phone_digits(phone);
    if digits.is_empty() {
        return Ok(0);
    }
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE contacts SET status = 'blacklisted', error_message = 'Opted out'
                 WHERE phone_digits = ?1 AND status = 'pending'",
                params![digits],
            )
        })
        .await
        .map(|n| n as u64)
        .map_err(map_tr_err)
}
