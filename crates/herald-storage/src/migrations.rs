// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations, compiled in with refinery.

use herald_core::HeraldError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply every pending migration. Refinery records progress in
/// `refinery_schema_history`.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), HeraldError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| HeraldError::Storage {
            source: Box::new(e),
        })?;
    Ok(())
}
