// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The scheduler's owned state and its named transitions.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use strum::Display;
use tokio::time::Instant;

/// Top-level scheduler mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SchedulerMode {
    Idle,
    Running,
    Paused,
}

/// What a running loop is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Idle,
    ReplyPause,
    Standby,
    Cooldown,
    AwaitingConnection,
    Dispatching,
}

#[derive(Debug, Clone)]
pub struct SchedulerState {
    mode: SchedulerMode,
    activity: Activity,
    campaign_id: Option<String>,
    sent_in_burst: u32,
    burst_target: u32,
    consecutive_failures: u32,
    last_reply: Option<Instant>,
    cap_override: Option<NaiveDate>,
    cached_cap: Option<(NaiveDate, u64)>,
}

impl SchedulerState {
    pub fn new(burst_target: u32) -> Self {
        Self {
            mode: SchedulerMode::Idle,
            activity: Activity::Idle,
            campaign_id: None,
            sent_in_burst: 0,
            burst_target: burst_target.max(1),
            consecutive_failures: 0,
            last_reply: None,
            cap_override: None,
            cached_cap: None,
        }
    }

    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn campaign_id(&self) -> Option<&str> {
        self.campaign_id.as_deref()
    }

    pub fn sent_in_burst(&self) -> u32 {
        self.sent_in_burst
    }

    pub fn burst_target(&self) -> u32 {
        self.burst_target
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Enter `running`. Returns whether the mode changed.
    pub fn start(&mut self) -> bool {
        let changed = self.mode != SchedulerMode::Running;
        self.mode = SchedulerMode::Running;
        changed
    }

    pub fn pause(&mut self) {
        self.mode = SchedulerMode::Paused;
        self.activity = Activity::Idle;
    }

    /// Enter `idle` and drop the bound campaign.
    pub fn go_idle(&mut self) {
        self.mode = SchedulerMode::Idle;
        self.activity = Activity::Idle;
        self.campaign_id = None;
    }

    pub fn bind(&mut self, campaign_id: impl Into<String>) {
        self.campaign_id = Some(campaign_id.into());
    }

    pub fn unbind(&mut self) -> Option<String> {
        self.campaign_id.take()
    }

    /// Record the current activity. Returns whether it changed, so callers
    /// can log transitions once.
    pub fn set_activity(&mut self, activity: Activity) -> bool {
        let changed = self.activity != activity;
        self.activity = activity;
        changed
    }

    pub fn burst_reached(&self) -> bool {
        self.sent_in_burst >= self.burst_target
    }

    pub fn record_sent(&mut self) {
        self.sent_in_burst += 1;
        self.consecutive_failures = 0;
    }

    /// Count a failed send. Returns `true` when `threshold` consecutive
    /// failures were reached, resetting the counter.
    pub fn record_failure(&mut self, threshold: u32) -> bool {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= threshold.max(1) {
            self.consecutive_failures = 0;
            true
        } else {
            false
        }
    }

    pub fn reset_burst(&mut self, next_target: u32) {
        self.sent_in_burst = 0;
        self.burst_target = next_target.max(1);
    }

    pub fn record_reply(&mut self, at: Instant) {
        self.last_reply = Some(at);
    }

    pub fn reply_pause_active(&self, now: Instant, window: Duration) -> bool {
        self.last_reply
            .is_some_and(|at| now.saturating_duration_since(at) < window)
    }

    /// Ignore the daily cap for the rest of `day`.
    pub fn override_cap(&mut self, day: NaiveDate) {
        self.cap_override = Some(day);
    }

    pub fn cap_overridden(&self, day: NaiveDate) -> bool {
        self.cap_override == Some(day)
    }

    pub fn cached_cap(&self, day: NaiveDate) -> Option<u64> {
        self.cached_cap
            .and_then(|(cached_day, cap)| (cached_day == day).then_some(cap))
    }

    pub fn cache_cap(&mut self, day: NaiveDate, cap: u64) {
        self.cached_cap = Some((day, cap));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_and_unbound() {
        let state = SchedulerState::new(3);
        assert_eq!(state.mode(), SchedulerMode::Idle);
        assert_eq!(state.activity(), Activity::Idle);
        assert!(state.campaign_id().is_none());
    }

    #[test]
    fn go_idle_unbinds() {
        let mut state = SchedulerState::new(3);
        assert!(state.start());
        assert!(!state.start());
        state.bind("c1");
        state.go_idle();
        assert_eq!(state.mode(), SchedulerMode::Idle);
        assert!(state.campaign_id().is_none());
    }

    #[test]
    fn burst_counts_to_target() {
        let mut state = SchedulerState::new(2);
        state.record_sent();
        assert!(!state.burst_reached());
        state.record_sent();
        assert!(state.burst_reached());
        state.reset_burst(4);
        assert!(!state.burst_reached());
        assert_eq!(state.burst_target(), 4);
    }

    #[test]
    fn failure_threshold_resets_counter() {
        let mut state = SchedulerState::new(2);
        for _ in 0..4 {
            assert!(!state.record_failure(5));
        }
        assert!(state.record_failure(5));
        assert_eq!(state.consecutive_failures(), 0);
    }

    #[test]
    fn success_clears_failure_streak() {
        let mut state = SchedulerState::new(10);
        state.record_failure(5);
        state.record_failure(5);
        state.record_sent();
        assert_eq!(state.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_pause_window() {
        let mut state = SchedulerState::new(1);
        let window = Duration::from_secs(300);
        assert!(!state.reply_pause_active(Instant::now(), window));
        state.record_reply(Instant::now());
        assert!(state.reply_pause_active(Instant::now(), window));
        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(!state.reply_pause_active(Instant::now(), window));
    }

    #[test]
    fn cap_override_is_per_day() {
        let mut state = SchedulerState::new(1);
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let tomorrow = today.succ_opt().unwrap();
        state.override_cap(today);
        assert!(state.cap_overridden(today));
        assert!(!state.cap_overridden(tomorrow));
    }

    #[test]
    fn cached_cap_expires_with_the_day() {
        let mut state = SchedulerState::new(1);
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        state.cache_cap(today, 250);
        assert_eq!(state.cached_cap(today), Some(250));
        assert_eq!(state.cached_cap(today.succ_opt().unwrap()), None);
    }
}
