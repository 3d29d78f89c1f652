// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading.

use figment::Jail;
use herald_config::diagnostic::ConfigError;
use herald_config::model::{DailyCapMode, PacingPreset};
use herald_config::{load_and_validate_str, load_config, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[agent]
name = "night-shift"
log_level = "debug"

[storage]
database_path = "/tmp/herald-test.db"
wal_mode = false

[transport]
bridge_url = "ws://10.0.0.5:3030/session"

[connection]
max_conflicts = 5
preserve_keys = ["active_instance_owner", "device_label"]

[pacing]
preset = "custom"
min_delay_secs = 5
max_delay_secs = 10
daily_cap_mode = "adaptive"
adaptive_floor = 50

[scheduler]
reply_pause_secs = 120
stop_keywords = ["stop"]

[template]
watermark_suffix_max = 5
watermark_prefix = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.name, "night-shift");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.transport.bridge_url, "ws://10.0.0.5:3030/session");
    assert_eq!(config.connection.max_conflicts, 5);
    assert_eq!(config.connection.preserve_keys.len(), 2);
    assert_eq!(config.pacing.preset, PacingPreset::Custom);
    assert_eq!(config.pacing.daily_cap_mode, DailyCapMode::Adaptive);
    assert_eq!(config.pacing.adaptive_floor, 50);
    assert_eq!(config.scheduler.reply_pause_secs, 120);
    assert_eq!(config.scheduler.stop_keywords, vec!["stop"]);
    assert_eq!(config.template.watermark_suffix_max, 5);
    assert!(!config.template.watermark_prefix);
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.pacing.daily_cap, 200);
    assert_eq!(config.scheduler.standby_recheck_secs, 1_200);
    assert_eq!(config.connection.integrity_check_secs, 10);
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = "[pacing]\ndaly_cap = 10\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "daly_cap");
            assert_eq!(suggestion.as_deref(), Some("daily_cap"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telegram]\nbot_token = \"x\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[pacing]\ndaily_cap = \"many\"\n").unwrap_err();
    match &errors[0] {
        ConfigError::InvalidType { key, .. } => assert_eq!(key, "pacing.daily_cap"),
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

#[test]
fn semantic_errors_surface_after_parse() {
    let toml = "[pacing]\nburst_min = 6\nburst_max = 2\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn env_overrides_map_to_sections() {
    Jail::expect_with(|jail| {
        jail.set_env("HERALD_PACING_DAILY_CAP", "75");
        jail.set_env("HERALD_SCHEDULER_REPLY_PAUSE_SECS", "60");
        jail.set_env("HERALD_TRANSPORT_BRIDGE_URL", "ws://sidecar:9000");
        let config = load_config()?;
        assert_eq!(config.pacing.daily_cap, 75);
        assert_eq!(config.scheduler.reply_pause_secs, 60);
        assert_eq!(config.transport.bridge_url, "ws://sidecar:9000");
        Ok(())
    });
}

#[test]
fn local_file_overrides_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file("herald.toml", "[pacing]\npreset = \"fast\"\n")?;
        let config = load_config()?;
        assert_eq!(config.pacing.preset, PacingPreset::Fast);
        Ok(())
    });
}
