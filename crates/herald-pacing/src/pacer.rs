// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Random draws within the pacing windows.

use std::time::Duration;

use rand::Rng;

use crate::policy::PacingPolicy;

/// Draws delays, burst sizes, and typing timings from a [`PacingPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    policy: PacingPolicy,
}

/// Presence timings for one human-looking send.
///
/// The sequence is: go online, type, pause as if thinking, type again for
/// `typing`, send, linger, then go offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingPlan {
    pub online: Duration,
    pub first_burst: Duration,
    pub hesitation: Duration,
    pub typing: Duration,
    pub linger: Duration,
}

impl TypingPlan {
    pub fn total(&self) -> Duration {
        self.online + self.first_burst + self.hesitation + self.typing + self.linger
    }
}

impl Pacer {
    pub fn new(policy: PacingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PacingPolicy {
        &self.policy
    }

    /// Uniform in `[min_delay, max_delay]`.
    pub fn next_inter_message_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        uniform(rng, self.policy.min_delay, self.policy.max_delay)
    }

    /// Messages to send before the next cooldown, uniform in `[burst_min, burst_max]`.
    pub fn next_burst_target<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let lo = self.policy.burst_min.max(1);
        rng.gen_range(lo..=self.policy.burst_max.max(lo))
    }

    /// Uniform in `[cooldown_min, cooldown_max]`.
    pub fn cooldown_duration<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        uniform(rng, self.policy.cooldown_min, self.policy.cooldown_max)
    }

    /// Typing time proportional to the message length, clamped to the window.
    pub fn typing_duration(&self, chars: usize) -> Duration {
        let per_char = self.policy.typing_per_char.saturating_mul(chars.min(u32::MAX as usize) as u32);
        per_char.clamp(self.policy.typing_min, self.policy.typing_max.max(self.policy.typing_min))
    }

    /// Full presence sequence for a message of `chars` characters.
    pub fn typing_plan<R: Rng + ?Sized>(&self, chars: usize, rng: &mut R) -> TypingPlan {
        TypingPlan {
            online: uniform(rng, Duration::from_secs(2), Duration::from_secs(5)),
            first_burst: uniform(rng, Duration::from_secs(2), Duration::from_secs(6)),
            hesitation: uniform(rng, Duration::from_secs(2), Duration::from_secs(5)),
            typing: self.typing_duration(chars),
            linger: Duration::from_secs(4),
        }
    }
}

/// Uniform duration in `[lo, hi]` at millisecond resolution. An inverted
/// window collapses to `lo`.
fn uniform<R: Rng + ?Sized>(rng: &mut R, lo: Duration, hi: Duration) -> Duration {
    let lo_ms = lo.as_millis() as u64;
    let hi_ms = (hi.as_millis() as u64).max(lo_ms);
    Duration::from_millis(rng.gen_range(lo_ms..=hi_ms))
}
