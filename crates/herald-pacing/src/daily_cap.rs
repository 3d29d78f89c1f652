// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily send caps and UTC day boundaries.
//!
//! The cap strategy is picked once from configuration. The scheduler asks it
//! for today's cap with yesterday's terminal volume and compares the result
//! against today's terminal-outcome count.

use chrono::{DateTime, Days, NaiveTime, Utc};
use herald_config::model::{DailyCapMode, PacingConfig};

/// Computes today's cap from yesterday's completed volume.
pub trait DailyCapStrategy: Send + Sync {
    fn cap(&self, previous_day_volume: u64) -> u64;

    /// Whether `cap` reads its argument. Lets callers skip the history query.
    fn uses_history(&self) -> bool;
}

/// A constant ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCap(pub u64);

impl DailyCapStrategy for FixedCap {
    fn cap(&self, _previous_day_volume: u64) -> u64 {
        self.0
    }

    fn uses_history(&self) -> bool {
        false
    }
}

/// Warm-up growth: `clamp(previous + increment, floor, ceiling)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveCap {
    pub increment: u64,
    pub floor: u64,
    pub ceiling: u64,
}

impl DailyCapStrategy for AdaptiveCap {
    fn cap(&self, previous_day_volume: u64) -> u64 {
        previous_day_volume
            .saturating_add(self.increment)
            .clamp(self.floor, self.ceiling.max(self.floor))
    }

    fn uses_history(&self) -> bool {
        true
    }
}

pub fn strategy_from_config(config: &PacingConfig) -> Box<dyn DailyCapStrategy> {
    match config.daily_cap_mode {
        DailyCapMode::Fixed => Box::new(FixedCap(config.daily_cap)),
        DailyCapMode::Adaptive => Box::new(AdaptiveCap {
            increment: config.adaptive_increment,
            floor: config.adaptive_floor,
            ceiling: config.adaptive_ceiling,
        }),
    }
}

/// `today_count >= cap`.
pub fn is_over_daily_cap(today_count: u64, cap: u64) -> bool {
    today_count >= cap
}

/// `[midnight, next midnight)` in UTC for the day containing `now`.
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let end = start
        .checked_add_days(Days::new(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}

/// UTC bounds of the day before the one containing `now`.
pub fn previous_day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (today_start, _) = day_bounds(now);
    let start = today_start
        .checked_sub_days(Days::new(1))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    (start, today_start)
}
