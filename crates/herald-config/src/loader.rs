// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/herald/herald.toml`,
//! `$XDG_CONFIG/herald/herald.toml`, `./herald.toml`, then `HERALD_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HeraldConfig;

/// Sections that may be targeted from the environment.
const SECTIONS: &[&str] = &[
    "agent",
    "storage",
    "transport",
    "connection",
    "pacing",
    "scheduler",
    "template",
];

/// Config file locations, lowest precedence first.
pub fn config_file_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/herald/herald.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("herald").join("herald.toml"));
    }
    paths.push(PathBuf::from("herald.toml"));
    paths
}

/// Build the full layered Figment without extracting it.
pub fn build_figment() -> Figment {
    config_file_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(HeraldConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Load configuration from the standard hierarchy with env overrides.
pub fn load_config() -> Result<HeraldConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from one explicit file, still honoring env overrides.
pub fn load_config_from_path(path: &Path) -> Result<HeraldConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HeraldConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Load configuration from an inline TOML string. No env overrides.
pub fn load_config_from_str(toml_content: &str) -> Result<HeraldConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HeraldConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Map `HERALD_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Section names are matched explicitly because keys contain underscores:
/// `HERALD_PACING_DAILY_CAP` must become `pacing.daily_cap`.
fn env_provider() -> Env {
    Env::prefixed("HERALD_").map(|key| env_key(key.as_str()).into())
}

/// Figment hands over the key with the prefix stripped but the case intact.
fn env_key(raw: &str) -> String {
    let key = raw.to_ascii_lowercase();
    SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|rest| format!("{section}.{rest}"))
        })
        .unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_at_the_section() {
        assert_eq!(env_key("PACING_DAILY_CAP"), "pacing.daily_cap");
        assert_eq!(
            env_key("SCHEDULER_REPLY_PAUSE_SECS"),
            "scheduler.reply_pause_secs"
        );
        assert_eq!(env_key("transport_bridge_url"), "transport.bridge_url");
    }

    #[test]
    fn unknown_sections_pass_through_lowercased() {
        assert_eq!(env_key("NOPE_VALUE"), "nope_value");
    }
}
