// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed string values: transport credentials, the ownership marker, the
//! exposed pairing code, and control requests.

use chrono::Utc;
use herald_core::HeraldError;
use herald_core::clock::format_timestamp;
use rusqlite::{OptionalExtension, params, params_from_iter};

use crate::database::{Database, map_tr_err};

pub async fn read(db: &Database, key: &str) -> Result<Option<String>, HeraldError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT value FROM auth_keys WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn write(db: &Database, key: &str, value: &str) -> Result<(), HeraldError> {
    let key = key.to_string();
    let value = value.to_string();
    let updated_at = format_timestamp(&Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO auth_keys (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete(db: &Database, key: &str) -> Result<(), HeraldError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM auth_keys WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete every key not listed in `keep`.
pub async fn delete_except(db: &Database, keep: &[String]) -> Result<u64, HeraldError> {
    let keep = keep.to_vec();
    db.connection()
        .call(move |conn| {
            let removed = if keep.is_empty() {
                conn.execute("DELETE FROM auth_keys", [])?
            } else {
                let placeholders = vec!["?"; keep.len()].join(", ");
                conn.execute(
                    &format!("DELETE FROM auth_keys WHERE key NOT IN ({placeholders})"),
                    params_from_iter(keep.iter()),
                )?
            };
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}
