// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime connection settings derived from `[connection]`.

use std::time::Duration;

use herald_config::model::ConnectionConfig;
use rand::Rng;

/// Store key holding the instance id of the process that owns the session.
pub const OWNER_KEY: &str = "active_instance_owner";

/// Store key holding the serialized primary credential set.
pub const CREDENTIALS_KEY: &str = "creds";

/// Store key exposing the current pairing payload to other processes.
pub const PAIRING_KEY: &str = "pairing_code";

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub integrity_check: Duration,
    pub max_conflicts: u32,
    pub logged_out_delay: Duration,
    pub transient_delay: Duration,
    pub conflict_delay_min: Duration,
    pub conflict_delay_max: Duration,
    /// Keys that survive a credential wipe.
    pub preserve_keys: Vec<String>,
    pub read_receipt_probability: f64,
    pub read_receipt_delay_min: Duration,
    pub read_receipt_delay_max: Duration,
    pub event_buffer: usize,
    /// Pause between ending the session and reconnecting on an operator reset.
    pub reset_delay: Duration,
}

impl ConnectionSettings {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            integrity_check: Duration::from_secs(config.integrity_check_secs),
            max_conflicts: config.max_conflicts.max(1),
            logged_out_delay: Duration::from_millis(config.logged_out_delay_ms),
            transient_delay: Duration::from_millis(config.transient_delay_ms),
            conflict_delay_min: Duration::from_millis(config.conflict_delay_min_ms),
            conflict_delay_max: Duration::from_millis(config.conflict_delay_max_ms),
            preserve_keys: config.preserve_keys.clone(),
            read_receipt_probability: config.read_receipt_probability.clamp(0.0, 1.0),
            read_receipt_delay_min: Duration::from_millis(config.read_receipt_delay_min_ms),
            read_receipt_delay_max: Duration::from_millis(config.read_receipt_delay_max_ms),
            event_buffer: config.event_buffer.max(1),
            reset_delay: Duration::from_secs(1),
        }
    }

    pub fn conflict_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        between(rng, self.conflict_delay_min, self.conflict_delay_max)
    }

    pub fn read_receipt_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        between(rng, self.read_receipt_delay_min, self.read_receipt_delay_max)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_config(&ConnectionConfig::default())
    }
}

fn between<R: Rng + ?Sized>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    let lo = min.as_millis() as u64;
    let hi = (max.as_millis() as u64).max(lo);
    Duration::from_millis(rng.gen_range(lo..=hi))
}
