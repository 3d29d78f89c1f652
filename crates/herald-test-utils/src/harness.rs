// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a temp SQLite store, a [`MockTransport`], a
//! connection manager, and an engine, with pacing tightened so a whole
//! campaign runs in seconds of virtual time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::watch;

use herald_config::model::{HeraldConfig, PacingPreset, StorageConfig};
use herald_connection::{ConnectionManager, ConnectionSettings};
use herald_core::{Campaign, ConnectionState, ContactCounts, HeraldError, StorageAdapter};
use herald_dispatch::{Engine, ImportRow};
use herald_storage::SqliteStorage;

use crate::clock::ManualClock;
use crate::mock_transport::MockTransport;

/// Configuration tuned for tests: one-second pacing, no typing simulation,
/// no read receipts, large bursts and cap.
pub fn test_config(database_path: String) -> HeraldConfig {
    let mut config = HeraldConfig {
        storage: StorageConfig {
            database_path,
            wal_mode: true,
        },
        ..HeraldConfig::default()
    };
    config.pacing.preset = PacingPreset::Custom;
    config.pacing.min_delay_secs = 1;
    config.pacing.max_delay_secs = 1;
    config.pacing.burst_min = 1000;
    config.pacing.burst_max = 1000;
    config.pacing.cooldown_min_secs = 60;
    config.pacing.cooldown_max_secs = 60;
    config.pacing.daily_cap = 1000;
    config.scheduler.simulate_typing = false;
    config.scheduler.cooldown_presence = false;
    config.scheduler.idle_poll_secs = 1;
    config.connection.read_receipt_probability = 0.0;
    config.connection.integrity_check_secs = 1;
    config
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    tweaks: Vec<Box<dyn FnOnce(&mut HeraldConfig) + Send>>,
    clock: Option<ManualClock>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            tweaks: Vec::new(),
            clock: None,
        }
    }

    /// Adjust the test configuration before anything is built.
    pub fn with_config(mut self, tweak: impl FnOnce(&mut HeraldConfig) + Send + 'static) -> Self {
        self.tweaks.push(Box::new(tweak));
        self
    }

    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub async fn build(self) -> Result<TestHarness, HeraldError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| HeraldError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("herald.db");
        let mut config = test_config(db_path.to_string_lossy().to_string());
        for tweak in self.tweaks {
            tweak(&mut config);
        }

        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;

        let clock = self
            .clock
            .unwrap_or_else(|| ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()));
        let transport = MockTransport::new();
        let connection = ConnectionManager::new(
            Arc::new(transport.clone()),
            storage.clone(),
            ConnectionSettings::from_config(&config.connection),
        );
        let engine = Engine::new(
            &config,
            storage.clone(),
            storage.clone(),
            connection.clone(),
            Arc::new(clock.clone()),
        );

        Ok(TestHarness {
            storage,
            transport,
            connection,
            engine,
            clock,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock transport and temp storage.
pub struct TestHarness {
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    pub transport: MockTransport,
    pub connection: ConnectionManager,
    pub engine: Engine,
    pub clock: ManualClock,
    pub config: HeraldConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub async fn new() -> Result<Self, HeraldError> {
        Self::builder().build().await
    }

    /// Start the session and wait for `connected`.
    pub async fn connect(&self) -> Result<(), HeraldError> {
        let mut state = self.connection.watch_state();
        self.engine.start_session().await?;
        wait_for_state(&mut state, ConnectionState::Connected).await
    }

    /// Create a running campaign with one contact per phone. Each row also
    /// carries a `name` column.
    pub async fn create_campaign(
        &self,
        template: &str,
        phones: &[&str],
    ) -> Result<Campaign, HeraldError> {
        let rows: Vec<ImportRow> = phones
            .iter()
            .enumerate()
            .map(|(i, phone)| {
                [("phone", phone.to_string()), ("name", format!("Contact {i}"))]
                    .into_iter()
                    .collect()
            })
            .collect();
        self.engine
            .create_campaign("test campaign", template, &rows, None)
            .await
    }

    pub async fn counts(&self, campaign_id: &str) -> Result<ContactCounts, HeraldError> {
        self.storage.campaign_counts(campaign_id).await
    }

    /// Poll until no contact of the campaign is pending.
    pub async fn wait_until_drained(&self, campaign_id: &str) -> Result<ContactCounts, HeraldError> {
        loop {
            let counts = self.counts(campaign_id).await?;
            if counts.pending == 0 {
                return Ok(counts);
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}

/// Wait until the watched connection state equals `target`.
pub async fn wait_for_state(
    state: &mut watch::Receiver<ConnectionState>,
    target: ConnectionState,
) -> Result<(), HeraldError> {
    state
        .wait_for(|s| *s == target)
        .await
        .map(|_| ())
        .map_err(|_| HeraldError::Internal("connection manager dropped".into()))
}
