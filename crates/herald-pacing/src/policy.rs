// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pacing windows and the named presets.

use std::time::Duration;

use herald_config::model::{PacingConfig, PacingPreset};

/// The fixed windows one run paces with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub burst_min: u32,
    pub burst_max: u32,
    pub cooldown_min: Duration,
    pub cooldown_max: Duration,
    pub typing_per_char: Duration,
    pub typing_min: Duration,
    pub typing_max: Duration,
}

impl PacingPolicy {
    /// Slow pacing: 30-90 s between sends, bursts of 1-4, 10-30 min cooldowns.
    pub fn safe() -> Self {
        Self {
            min_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(90),
            burst_min: 1,
            burst_max: 4,
            cooldown_min: Duration::from_secs(10 * 60),
            cooldown_max: Duration::from_secs(30 * 60),
            ..Self::typing_defaults()
        }
    }

    /// Aggressive pacing: 8-20 s between sends, bursts of 5-12, 3-8 min cooldowns.
    pub fn fast() -> Self {
        Self {
            min_delay: Duration::from_secs(8),
            max_delay: Duration::from_secs(20),
            burst_min: 5,
            burst_max: 12,
            cooldown_min: Duration::from_secs(3 * 60),
            cooldown_max: Duration::from_secs(8 * 60),
            ..Self::typing_defaults()
        }
    }

    fn typing_defaults() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            burst_min: 1,
            burst_max: 1,
            cooldown_min: Duration::ZERO,
            cooldown_max: Duration::ZERO,
            typing_per_char: Duration::from_millis(60),
            typing_min: Duration::from_millis(3_000),
            typing_max: Duration::from_millis(15_000),
        }
    }

    /// Resolve the configured preset. Typing settings always come from config.
    pub fn from_config(config: &PacingConfig) -> Self {
        let windows = match config.preset {
            PacingPreset::Safe => Self::safe(),
            PacingPreset::Fast => Self::fast(),
            PacingPreset::Custom => Self {
                min_delay: Duration::from_secs(config.min_delay_secs),
                max_delay: Duration::from_secs(config.max_delay_secs),
                burst_min: config.burst_min.max(1),
                burst_max: config.burst_max.max(config.burst_min.max(1)),
                cooldown_min: Duration::from_secs(config.cooldown_min_secs),
                cooldown_max: Duration::from_secs(config.cooldown_max_secs),
                ..Self::typing_defaults()
            },
        };
        Self {
            typing_per_char: Duration::from_millis(config.typing_ms_per_char),
            typing_min: Duration::from_millis(config.typing_min_ms),
            typing_max: Duration::from_millis(config.typing_max_ms),
            ..windows
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_ordered() {
        for p in [PacingPolicy::safe(), PacingPolicy::fast()] {
            assert!(p.min_delay <= p.max_delay);
            assert!(1 <= p.burst_min && p.burst_min <= p.burst_max);
            assert!(p.cooldown_min <= p.cooldown_max);
        }
        assert!(PacingPolicy::fast().max_delay < PacingPolicy::safe().min_delay);
    }

    #[test]
    fn custom_preset_uses_explicit_fields() {
        let config = PacingConfig {
            preset: PacingPreset::Custom,
            min_delay_secs: 1,
            max_delay_secs: 2,
            burst_min: 3,
            burst_max: 3,
            typing_ms_per_char: 10,
            ..PacingConfig::default()
        };
        let policy = PacingPolicy::from_config(&config);
        assert_eq!(policy.max_delay, Duration::from_secs(2));
        assert_eq!(policy.burst_min, 3);
        assert_eq!(policy.typing_per_char, Duration::from_millis(10));
    }

    #[test]
    fn named_preset_ignores_window_fields() {
        let config = PacingConfig {
            preset: PacingPreset::Fast,
            min_delay_secs: 999,
            ..PacingConfig::default()
        };
        assert_eq!(PacingPolicy::from_config(&config).min_delay, Duration::from_secs(8));
    }
}
