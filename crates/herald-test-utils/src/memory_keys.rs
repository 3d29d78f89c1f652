// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `KeyStore` for connection tests that need no database.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use herald_core::{HeraldError, KeyStore};

#[derive(Clone, Default)]
pub struct MemoryKeyStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently stored, sorted.
    pub async fn keys(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn read_key(&self, key: &str) -> Result<Option<String>, HeraldError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn write_key(&self, key: &str, value: &str) -> Result<(), HeraldError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<(), HeraldError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn delete_keys_except(&self, keep: &[String]) -> Result<u64, HeraldError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|k, _| keep.contains(k));
        Ok((before - entries.len()) as u64)
    }
}
