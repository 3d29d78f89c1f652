// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed blob store for credential material and process-coordination markers.

use async_trait::async_trait;

use crate::error::HeraldError;

/// A keyed string store.
///
/// Holds transport credentials, the ownership marker, the exposed pairing
/// code, and cross-process control requests.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Read a value. Missing keys yield `None`.
    async fn read_key(&self, key: &str) -> Result<Option<String>, HeraldError>;

    /// Insert or replace a value.
    async fn write_key(&self, key: &str, value: &str) -> Result<(), HeraldError>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete_key(&self, key: &str) -> Result<(), HeraldError>;

    /// Remove every key not in `keep`. Returns the number of keys removed.
    async fn delete_keys_except(&self, keep: &[String]) -> Result<u64, HeraldError>;
}
