// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-fatal conditions raised by the connection manager.
//!
//! The library never exits the process itself. It raises a [`FatalSignal`]
//! and the binary decides the exit code.

use std::sync::{Arc, OnceLock};

use strum::Display;
use tokio_util::sync::CancellationToken;

/// Why the process has to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FatalReason {
    /// Another instance rewrote the ownership marker.
    OwnershipLost,
    /// Too many consecutive conflict closes.
    RepeatedConflict,
}

impl FatalReason {
    /// Exit code the binary reports. Losing ownership to a newer instance is
    /// an orderly handover, so it exits cleanly.
    pub fn exit_code(self) -> i32 {
        match self {
            FatalReason::OwnershipLost => 0,
            FatalReason::RepeatedConflict => 1,
        }
    }
}

/// One-shot, cloneable fatal flag. The first raised reason wins.
#[derive(Debug, Clone, Default)]
pub struct FatalSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<FatalReason>>,
}

impl FatalSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Later calls keep the first reason.
    pub fn raise(&self, reason: FatalReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    pub fn is_raised(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<FatalReason> {
        self.reason.get().copied()
    }

    /// Resolves once the signal is raised, yielding the reason.
    pub async fn wait(&self) -> FatalReason {
        self.token.cancelled().await;
        self.reason().unwrap_or(FatalReason::RepeatedConflict)
    }

    /// Token cancelled when the signal is raised, for `select!` arms.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_wins() {
        let signal = FatalSignal::new();
        assert!(!signal.is_raised());
        signal.raise(FatalReason::OwnershipLost);
        signal.raise(FatalReason::RepeatedConflict);
        assert!(signal.is_raised());
        assert_eq!(signal.reason(), Some(FatalReason::OwnershipLost));
    }

    #[test]
    fn exit_codes() {
        assert_eq!(FatalReason::OwnershipLost.exit_code(), 0);
        assert_eq!(FatalReason::RepeatedConflict.exit_code(), 1);
    }

    #[tokio::test]
    async fn wait_resolves_for_clones() {
        let signal = FatalSignal::new();
        let clone = signal.clone();
        tokio::spawn(async move { clone.raise(FatalReason::RepeatedConflict) });
        assert_eq!(signal.wait().await, FatalReason::RepeatedConflict);
    }
}
