// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `herald serve`: own the transport session and dispatch running campaigns.
//!
//! The process holds the session until a shutdown signal or a fatal
//! connection condition, then idles the scheduler, ends the session, and
//! closes the store. The returned exit code reflects the fatal reason.

use std::sync::Arc;

use herald_bridge::BridgeTransport;
use herald_config::model::HeraldConfig;
use herald_connection::{ConnectionManager, ConnectionSettings};
use herald_core::{
    Clock, HealthStatus, HeraldError, PluginAdapter, StorageAdapter, SystemClock,
    TransportAdapter,
};
use herald_dispatch::Engine;
use herald_storage::SqliteStorage;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::shutdown::install_signal_handler;

/// Runs the `herald serve` command against the configured bridge.
pub async fn run_serve(config: HeraldConfig) -> Result<i32, HeraldError> {
    init_tracing(&config.agent.log_level);
    info!(name = %config.agent.name, "starting herald");

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let bridge = BridgeTransport::from_config(&config.transport);
    match bridge.health_check().await {
        Ok(HealthStatus::Healthy) => info!(url = %bridge.url(), "bridge reachable"),
        Ok(HealthStatus::Degraded(reason)) | Ok(HealthStatus::Unhealthy(reason)) => {
            warn!(url = %bridge.url(), %reason, "bridge not reachable yet; connection will retry");
        }
        Err(e) => warn!(error = %e, "bridge health check failed"),
    }

    serve_with(
        &config,
        Arc::new(bridge),
        storage,
        Arc::new(SystemClock),
        install_signal_handler(),
    )
    .await
}

/// Serve with an explicit transport, store, clock, and shutdown token.
pub async fn serve_with(
    config: &HeraldConfig,
    transport: Arc<dyn TransportAdapter>,
    storage: Arc<SqliteStorage>,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
) -> Result<i32, HeraldError> {
    let connection = ConnectionManager::new(
        transport,
        storage.clone(),
        ConnectionSettings::from_config(&config.connection),
    );
    let engine = Engine::new(
        config,
        storage.clone(),
        storage.clone(),
        connection.clone(),
        clock,
    );

    let tasks = shutdown.child_token();
    let handles = [
        engine.spawn_notice_listener(tasks.clone()),
        engine.spawn_idle_watcher(tasks.clone()),
        connection.spawn_integrity_check(),
        spawn_pairing_printer(&connection, tasks.clone()),
    ];

    if let Err(e) = engine.start_session().await {
        warn!(error = %e, "initial connect failed; retrying in the background");
    }
    info!(instance_id = %connection.instance_id(), "herald serving");

    let exit_code = tokio::select! {
        _ = shutdown.cancelled() => {
            info!("shutdown requested");
            0
        }
        reason = connection.fatal().wait() => {
            error!(%reason, "fatal connection condition, stopping");
            reason.exit_code()
        }
    };

    tasks.cancel();
    engine.shutdown().await;
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }
    storage.close().await?;
    info!(exit_code, "herald stopped");
    Ok(exit_code)
}

/// Print each new pairing code to stderr so the operator can scan it.
fn spawn_pairing_printer(connection: &ConnectionManager, cancel: CancellationToken) -> JoinHandle<()> {
    let mut pairing = connection.watch_pairing();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = pairing.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
            let code = pairing.borrow_and_update().clone();
            if let Some(code) = code {
                info!("pairing code issued; scan it from the phone app");
                eprintln!("\n{}\n", code.rendered);
            }
        }
    })
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("herald={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use herald_connection::OWNER_KEY;
    use herald_core::{KeyStore, TransportEvent};
    use herald_test_utils::{ManualClock, MockTransport, close_reason, test_config};

    use super::*;

    struct Served {
        storage: Arc<SqliteStorage>,
        transport: MockTransport,
        shutdown: CancellationToken,
        handle: JoinHandle<Result<i32, HeraldError>>,
        _dir: tempfile::TempDir,
    }

    async fn serve(transport: MockTransport) -> Served {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().join("herald.db").to_string_lossy().to_string());
        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await.unwrap();
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn({
            let storage = storage.clone();
            let transport: Arc<dyn TransportAdapter> = Arc::new(transport.clone());
            let shutdown = shutdown.clone();
            async move {
                let clock = Arc::new(ManualClock::new(Utc::now()));
                serve_with(&config, transport, storage, clock, shutdown).await
            }
        });
        Served {
            storage,
            transport,
            shutdown,
            handle,
            _dir: dir,
        }
    }

    async fn wait_for_opens(transport: &MockTransport, n: usize) {
        while transport.open_count() < n {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signal_ends_the_session_and_exits_cleanly() {
        let served = serve(MockTransport::new()).await;
        wait_for_opens(&served.transport, 1).await;

        served.shutdown.cancel();
        assert_eq!(served.handle.await.unwrap().unwrap(), 0);
        assert!(served.transport.end_count() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_ownership_exits_with_zero() {
        let served = serve(MockTransport::new()).await;
        wait_for_opens(&served.transport, 1).await;
        while served.storage.read_key(OWNER_KEY).await.unwrap().is_none() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        served
            .storage
            .write_key(OWNER_KEY, "another-instance")
            .await
            .unwrap();
        assert_eq!(served.handle.await.unwrap().unwrap(), 0);
        assert!(!served.shutdown.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_conflicts_exit_with_one() {
        let transport = MockTransport::new();
        for _ in 0..3 {
            transport
                .push_script(vec![TransportEvent::Closed(close_reason(Some(440)))])
                .await;
        }
        let served = serve(transport).await;

        assert_eq!(served.handle.await.unwrap().unwrap(), 1);
        assert_eq!(served.transport.open_count(), 3);
    }
}
