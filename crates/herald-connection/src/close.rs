// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of session close reasons.

use herald_core::types::CloseReason;
use strum::Display;

/// How the manager reacts to a closed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CloseKind {
    /// The session was invalidated; credentials must be wiped and paired again.
    LoggedOut,
    /// Another session took over this identity.
    Conflict,
    /// Anything else: reconnect with the same credentials.
    Transient,
}

/// Status codes the transport reports for an invalidated session.
const LOGGED_OUT_CODES: [u16; 2] = [401, 403];

/// Status code the transport reports when a newer session replaced this one.
const CONFLICT_CODE: u16 = 440;

pub fn classify_close(reason: &CloseReason) -> CloseKind {
    match reason.status_code {
        Some(code) if LOGGED_OUT_CODES.contains(&code) => CloseKind::LoggedOut,
        Some(CONFLICT_CODE) => CloseKind::Conflict,
        _ => CloseKind::Transient,
    }
}
