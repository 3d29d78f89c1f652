// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pacing decisions for the dispatch loop.
//!
//! Everything here is a pure function of policy, counters, and a caller
//! supplied RNG. Nothing sleeps and nothing touches the store.

pub mod daily_cap;
pub mod pacer;
pub mod policy;

pub use daily_cap::{
    AdaptiveCap, DailyCapStrategy, FixedCap, day_bounds, is_over_daily_cap, previous_day_bounds,
    strategy_from_config,
};
pub use pacer::{Pacer, TypingPlan};
pub use policy::PacingPolicy;
