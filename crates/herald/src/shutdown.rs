// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling for `herald serve`.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cancel the returned token on the first SIGINT or SIGTERM.
pub fn install_signal_handler() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();

    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        info!(signal, "stop signal received, ending the session");
        trigger.cancel();
        debug!("signal handler done");
    });

    shutdown
}

/// Wait for a stop signal and name it.
#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable; only Ctrl+C stops herald");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "Ctrl+C"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_stays_live_until_a_signal() {
        let shutdown = install_signal_handler();
        tokio::task::yield_now().await;
        assert!(!shutdown.is_cancelled());
    }
}
