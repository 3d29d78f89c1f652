// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interruptible sleeps for the dispatch loop.
//!
//! Long waits are split into increments. A halt, raised whenever the
//! scheduler leaves `running`, ends every sleep within one increment and keeps
//! ending them until cleared. A standby release ends only the daily-cap
//! standby. Inter-message delays and cooldowns run their full length otherwise.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    Elapsed,
    Interrupted,
}

/// Which wake-ups end a sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Delays, cooldowns, backoffs, typing. Only a halt ends them.
    Pacing,
    /// Daily-cap standby. A halt or a standby release ends it.
    Standby,
}

#[derive(Debug)]
pub struct Interrupt {
    increment: Duration,
    halted: AtomicBool,
    release: AtomicBool,
    notify: Notify,
}

impl Interrupt {
    pub fn new(increment: Duration) -> Self {
        Self {
            increment: increment.max(Duration::from_millis(1)),
            halted: AtomicBool::new(false),
            release: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// End the current sleep and every later one until [`Self::clear_halt`].
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn clear_halt(&self) {
        self.halted.store(false, Ordering::Release);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// End the current (or next) standby sleep.
    pub fn release_standby(&self) {
        self.release.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Drop a release nobody waited for.
    pub fn clear_release(&self) {
        self.release.store(false, Ordering::Release);
    }

    fn should_end(&self, wait: Wait) -> bool {
        if self.is_halted() {
            return true;
        }
        wait == Wait::Standby && self.release.swap(false, Ordering::AcqRel)
    }

    /// Sleep for `total` unless a wake-up that applies to `wait` comes first.
    pub async fn sleep(&self, total: Duration, wait: Wait) -> SleepOutcome {
        let deadline = Instant::now() + total;
        loop {
            if self.should_end(wait) {
                return SleepOutcome::Interrupted;
            }
            let now = Instant::now();
            if now >= deadline {
                return SleepOutcome::Elapsed;
            }
            let step = (deadline - now).min(self.increment);
            tokio::select! {
                _ = tokio::time::sleep(step) => {}
                _ = self.notify.notified() => {}
            }
        }
    }
}
