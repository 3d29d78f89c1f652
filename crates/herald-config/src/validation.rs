// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation of semantic constraints.

use crate::diagnostic::ConfigError;
use crate::model::HeraldConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every violation instead of stopping at the first one.
pub fn validate_config(config: &HeraldConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        errors.push(ConfigError::invalid(format!(
            "agent.log_level `{}` must be one of {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid("storage.database_path must not be empty"));
    }

    let url = config.transport.bridge_url.trim();
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        errors.push(ConfigError::invalid(format!(
            "transport.bridge_url `{url}` must be a ws:// or wss:// URL"
        )));
    }
    positive(
        &mut errors,
        "transport.request_timeout_secs",
        config.transport.request_timeout_secs,
    );

    let conn = &config.connection;
    positive(&mut errors, "connection.integrity_check_secs", conn.integrity_check_secs);
    positive(&mut errors, "connection.max_conflicts", conn.max_conflicts.into());
    positive(&mut errors, "connection.event_buffer", conn.event_buffer as u64);
    ordered(
        &mut errors,
        "connection.conflict_delay",
        conn.conflict_delay_min_ms,
        conn.conflict_delay_max_ms,
    );
    ordered(
        &mut errors,
        "connection.read_receipt_delay",
        conn.read_receipt_delay_min_ms,
        conn.read_receipt_delay_max_ms,
    );
    if !(0.0..=1.0).contains(&conn.read_receipt_probability) {
        errors.push(ConfigError::invalid(format!(
            "connection.read_receipt_probability must be within [0, 1], got {}",
            conn.read_receipt_probability
        )));
    }

    let pacing = &config.pacing;
    ordered(&mut errors, "pacing.delay", pacing.min_delay_secs, pacing.max_delay_secs);
    positive(&mut errors, "pacing.burst_min", pacing.burst_min.into());
    ordered(&mut errors, "pacing.burst", pacing.burst_min.into(), pacing.burst_max.into());
    ordered(
        &mut errors,
        "pacing.cooldown",
        pacing.cooldown_min_secs,
        pacing.cooldown_max_secs,
    );
    positive(&mut errors, "pacing.daily_cap", pacing.daily_cap);
    ordered(
        &mut errors,
        "pacing.adaptive",
        pacing.adaptive_floor,
        pacing.adaptive_ceiling,
    );
    ordered(&mut errors, "pacing.typing", pacing.typing_min_ms, pacing.typing_max_ms);

    let sched = &config.scheduler;
    positive(&mut errors, "scheduler.sleep_increment_ms", sched.sleep_increment_ms);
    positive(&mut errors, "scheduler.failure_threshold", sched.failure_threshold.into());
    positive(&mut errors, "scheduler.idle_poll_secs", sched.idle_poll_secs);
    if sched.stop_keywords.iter().any(|k| k.trim().is_empty()) {
        errors.push(ConfigError::invalid(
            "scheduler.stop_keywords must not contain empty entries",
        ));
    }

    let tpl = &config.template;
    positive(
        &mut errors,
        "template.watermark_suffix_min",
        tpl.watermark_suffix_min as u64,
    );
    ordered(
        &mut errors,
        "template.watermark_suffix",
        tpl.watermark_suffix_min as u64,
        tpl.watermark_suffix_max as u64,
    );

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn positive(errors: &mut Vec<ConfigError>, key: &str, value: u64) {
    if value == 0 {
        errors.push(ConfigError::invalid(format!("{key} must be at least 1")));
    }
}

/// `prefix` names a `<prefix>_min`/`<prefix>_max` style pair.
fn ordered(errors: &mut Vec<ConfigError>, prefix: &str, min: u64, max: u64) {
    if min > max {
        errors.push(ConfigError::invalid(format!(
            "{prefix}: minimum ({min}) must not exceed maximum ({max})"
        )));
    }
}
