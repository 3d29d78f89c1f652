// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Herald dispatch engine.
//!
//! Every struct uses `#[serde(deny_unknown_fields)]` so a misspelled key is
//! reported at startup instead of silently falling back to a default.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top-level Herald configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeraldConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// SQLite store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Transport sidecar settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Session resilience settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Send pacing and daily caps.
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Dispatch loop timings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Message rendering settings.
    #[serde(default)]
    pub template: TemplateConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name used in logs and status output.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "herald".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("herald").join("herald.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("herald.db"))
        .display()
        .to_string()
}

fn default_true() -> bool {
    true
}

/// Transport sidecar configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// WebSocket URL of the transport sidecar.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// How long a single request to the sidecar may take.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:3030/session".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Connection Manager configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Interval between ownership marker checks.
    #[serde(default = "default_integrity_check_secs")]
    pub integrity_check_secs: u64,

    /// Consecutive conflict closes tolerated before the process gives up.
    #[serde(default = "default_max_conflicts")]
    pub max_conflicts: u32,

    /// Reconnect delay after a logged-out close.
    #[serde(default = "default_logged_out_delay_ms")]
    pub logged_out_delay_ms: u64,

    /// Reconnect delay after any other close.
    #[serde(default = "default_transient_delay_ms")]
    pub transient_delay_ms: u64,

    #[serde(default = "default_conflict_delay_min_ms")]
    pub conflict_delay_min_ms: u64,

    #[serde(default = "default_conflict_delay_max_ms")]
    pub conflict_delay_max_ms: u64,

    /// Keys that survive a credential wipe.
    #[serde(default = "default_preserve_keys")]
    pub preserve_keys: Vec<String>,

    /// Probability that an inbound message gets a read receipt.
    #[serde(default = "default_read_receipt_probability")]
    pub read_receipt_probability: f64,

    #[serde(default = "default_read_receipt_delay_min_ms")]
    pub read_receipt_delay_min_ms: u64,

    #[serde(default = "default_read_receipt_delay_max_ms")]
    pub read_receipt_delay_max_ms: u64,

    /// Capacity of the inbound notice channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            integrity_check_secs: default_integrity_check_secs(),
            max_conflicts: default_max_conflicts(),
            logged_out_delay_ms: default_logged_out_delay_ms(),
            transient_delay_ms: default_transient_delay_ms(),
            conflict_delay_min_ms: default_conflict_delay_min_ms(),
            conflict_delay_max_ms: default_conflict_delay_max_ms(),
            preserve_keys: default_preserve_keys(),
            read_receipt_probability: default_read_receipt_probability(),
            read_receipt_delay_min_ms: default_read_receipt_delay_min_ms(),
            read_receipt_delay_max_ms: default_read_receipt_delay_max_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_integrity_check_secs() -> u64 {
    10
}

fn default_max_conflicts() -> u32 {
    3
}

fn default_logged_out_delay_ms() -> u64 {
    2_000
}

fn default_transient_delay_ms() -> u64 {
    5_000
}

fn default_conflict_delay_min_ms() -> u64 {
    5_000
}

fn default_conflict_delay_max_ms() -> u64 {
    15_000
}

fn default_preserve_keys() -> Vec<String> {
    vec!["active_instance_owner".to_string()]
}

fn default_read_receipt_probability() -> f64 {
    0.4
}

fn default_read_receipt_delay_min_ms() -> u64 {
    2_000
}

fn default_read_receipt_delay_max_ms() -> u64 {
    10_000
}

fn default_event_buffer() -> usize {
    64
}

/// Named pacing presets. `Custom` uses the explicit window fields.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PacingPreset {
    #[default]
    Safe,
    Fast,
    Custom,
}

/// How the daily cap is computed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DailyCapMode {
    #[default]
    Fixed,
    Adaptive,
}

/// Pacing configuration. Window fields only apply with `preset = "custom"`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PacingConfig {
    #[serde(default)]
    pub preset: PacingPreset,

    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: u64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    #[serde(default = "default_burst_min")]
    pub burst_min: u32,

    #[serde(default = "default_burst_max")]
    pub burst_max: u32,

    #[serde(default = "default_cooldown_min_secs")]
    pub cooldown_min_secs: u64,

    #[serde(default = "default_cooldown_max_secs")]
    pub cooldown_max_secs: u64,

    #[serde(default)]
    pub daily_cap_mode: DailyCapMode,

    /// Fixed cap, also the starting cap when no history exists.
    #[serde(default = "default_daily_cap")]
    pub daily_cap: u64,

    #[serde(default = "default_adaptive_increment")]
    pub adaptive_increment: u64,

    #[serde(default = "default_adaptive_floor")]
    pub adaptive_floor: u64,

    #[serde(default = "default_adaptive_ceiling")]
    pub adaptive_ceiling: u64,

    /// Typing indicator time per rendered character.
    #[serde(default = "default_typing_ms_per_char")]
    pub typing_ms_per_char: u64,

    #[serde(default = "default_typing_min_ms")]
    pub typing_min_ms: u64,

    #[serde(default = "default_typing_max_ms")]
    pub typing_max_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            preset: PacingPreset::default(),
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            burst_min: default_burst_min(),
            burst_max: default_burst_max(),
            cooldown_min_secs: default_cooldown_min_secs(),
            cooldown_max_secs: default_cooldown_max_secs(),
            daily_cap_mode: DailyCapMode::default(),
            daily_cap: default_daily_cap(),
            adaptive_increment: default_adaptive_increment(),
            adaptive_floor: default_adaptive_floor(),
            adaptive_ceiling: default_adaptive_ceiling(),
            typing_ms_per_char: default_typing_ms_per_char(),
            typing_min_ms: default_typing_min_ms(),
            typing_max_ms: default_typing_max_ms(),
        }
    }
}

fn default_min_delay_secs() -> u64 {
    30
}

fn default_max_delay_secs() -> u64 {
    90
}

fn default_burst_min() -> u32 {
    1
}

fn default_burst_max() -> u32 {
    4
}

fn default_cooldown_min_secs() -> u64 {
    600
}

fn default_cooldown_max_secs() -> u64 {
    1_800
}

fn default_daily_cap() -> u64 {
    200
}

fn default_adaptive_increment() -> u64 {
    200
}

fn default_adaptive_floor() -> u64 {
    200
}

fn default_adaptive_ceiling() -> u64 {
    2_000
}

fn default_typing_ms_per_char() -> u64 {
    60
}

fn default_typing_min_ms() -> u64 {
    3_000
}

fn default_typing_max_ms() -> u64 {
    15_000
}

/// Dispatch Scheduler timings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// How long an inbound reply pauses sending.
    #[serde(default = "default_reply_pause_secs")]
    pub reply_pause_secs: u64,

    /// Sleep between checks while the reply pause is active.
    #[serde(default = "default_reply_poll_secs")]
    pub reply_poll_secs: u64,

    /// Standby re-check interval once the daily cap is reached.
    #[serde(default = "default_standby_recheck_secs")]
    pub standby_recheck_secs: u64,

    /// Granularity of interruptible sleeps.
    #[serde(default = "default_sleep_increment_ms")]
    pub sleep_increment_ms: u64,

    #[serde(default = "default_connectivity_poll_secs")]
    pub connectivity_poll_secs: u64,

    #[serde(default = "default_probe_backoff_secs")]
    pub probe_backoff_secs: u64,

    #[serde(default = "default_invalid_backoff_secs")]
    pub invalid_backoff_secs: u64,

    #[serde(default = "default_failure_backoff_secs")]
    pub failure_backoff_secs: u64,

    /// Consecutive send failures that trigger an extended cooldown.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Show a typing indicator before each send.
    #[serde(default = "default_true")]
    pub simulate_typing: bool,

    /// Advertise `unavailable` while cooling down.
    #[serde(default = "default_true")]
    pub cooldown_presence: bool,

    /// How often the serving process looks for work while idle.
    #[serde(default = "default_idle_poll_secs")]
    pub idle_poll_secs: u64,

    /// Inbound texts containing any of these opt the sender out.
    #[serde(default = "default_stop_keywords")]
    pub stop_keywords: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reply_pause_secs: default_reply_pause_secs(),
            reply_poll_secs: default_reply_poll_secs(),
            standby_recheck_secs: default_standby_recheck_secs(),
            sleep_increment_ms: default_sleep_increment_ms(),
            connectivity_poll_secs: default_connectivity_poll_secs(),
            probe_backoff_secs: default_probe_backoff_secs(),
            invalid_backoff_secs: default_invalid_backoff_secs(),
            failure_backoff_secs: default_failure_backoff_secs(),
            failure_threshold: default_failure_threshold(),
            simulate_typing: true,
            cooldown_presence: true,
            idle_poll_secs: default_idle_poll_secs(),
            stop_keywords: default_stop_keywords(),
        }
    }
}

fn default_reply_pause_secs() -> u64 {
    300
}

fn default_reply_poll_secs() -> u64 {
    15
}

fn default_standby_recheck_secs() -> u64 {
    1_200
}

fn default_sleep_increment_ms() -> u64 {
    1_000
}

fn default_connectivity_poll_secs() -> u64 {
    5
}

fn default_probe_backoff_secs() -> u64 {
    5
}

fn default_invalid_backoff_secs() -> u64 {
    2
}

fn default_failure_backoff_secs() -> u64 {
    10
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_idle_poll_secs() -> u64 {
    30
}

fn default_stop_keywords() -> Vec<String> {
    [
        "0",
        "stop",
        "arret",
        "arrêt",
        "unsubscribe",
        "non",
        "no",
        "quitter",
        "pas interessé",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Template rendering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateConfig {
    /// Minimum number of invisible characters appended to each message.
    #[serde(default = "default_watermark_suffix_min")]
    pub watermark_suffix_min: usize,

    #[serde(default = "default_watermark_suffix_max")]
    pub watermark_suffix_max: usize,

    /// Randomly prepend a single invisible character.
    #[serde(default = "default_true")]
    pub watermark_prefix: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            watermark_suffix_min: default_watermark_suffix_min(),
            watermark_suffix_max: default_watermark_suffix_max(),
            watermark_prefix: true,
        }
    }
}

fn default_watermark_suffix_min() -> usize {
    1
}

fn default_watermark_suffix_max() -> usize {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = HeraldConfig::default();
        assert_eq!(config.agent.name, "herald");
        assert_eq!(config.connection.max_conflicts, 3);
        assert_eq!(config.connection.preserve_keys, vec!["active_instance_owner"]);
        assert_eq!(config.pacing.preset, PacingPreset::Safe);
        assert_eq!(config.pacing.daily_cap_mode, DailyCapMode::Fixed);
        assert_eq!(config.scheduler.failure_threshold, 5);
        assert!(config.scheduler.stop_keywords.iter().any(|k| k == "stop"));
        assert!(config.storage.database_path.ends_with("herald.db"));
    }

    #[test]
    fn preset_parses_lowercase() {
        assert_eq!("fast".parse::<PacingPreset>().unwrap(), PacingPreset::Fast);
        assert_eq!(DailyCapMode::Adaptive.to_string(), "adaptive");
    }
}
