// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport session lifecycle for the Herald dispatch engine.
//!
//! Keeps exactly one authenticated session alive, classifies closes into
//! logged-out, conflict, and transient, reconnects on its own, and fans out
//! inbound messages. Conditions that must end the process are reported through
//! [`FatalSignal`].

pub mod close;
pub mod fatal;
pub mod manager;
pub mod pairing;
pub mod settings;

pub use close::{CloseKind, classify_close};
pub use fatal::{FatalReason, FatalSignal};
pub use manager::{ConnectionManager, ConnectionNotice};
pub use pairing::PairingCode;
pub use settings::{CREDENTIALS_KEY, ConnectionSettings, OWNER_KEY, PAIRING_KEY};
