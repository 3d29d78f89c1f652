// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table.

pub mod auth_keys;
pub mod blacklist;
pub mod campaigns;
pub mod contacts;

/// Keep only ASCII digits. Blacklist and contact matching compare on this form.
pub fn phone_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}
