// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Herald dispatch engine.
//!
//! WAL-mode SQLite with embedded refinery migrations. All statements run on
//! tokio-rusqlite's single background thread, so campaign and contact
//! updates are read-after-write consistent within one process.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
