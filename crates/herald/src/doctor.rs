// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `herald doctor`: check the store, the bridge, and the session material.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use colored::Colorize;
use herald_bridge::BridgeTransport;
use herald_config::model::HeraldConfig;
use herald_connection::{CREDENTIALS_KEY, OWNER_KEY};
use herald_core::{HealthStatus, HeraldError, KeyStore, PluginAdapter, StorageAdapter};
use herald_storage::SqliteStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name,
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run every check. Returns whether none failed.
pub async fn run_doctor(config: &HeraldConfig, plain: bool) -> Result<bool, HeraldError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let mut results = Vec::new();

    let storage = SqliteStorage::new(config.storage.clone());
    let store_ok = {
        let start = Instant::now();
        match storage.initialize().await {
            Ok(()) => {
                results.push(CheckResult::new(
                    "Database",
                    CheckStatus::Pass,
                    format!("open at {}", config.storage.database_path),
                    start,
                ));
                true
            }
            Err(e) => {
                results.push(CheckResult::new("Database", CheckStatus::Fail, e.to_string(), start));
                false
            }
        }
    };
    if store_ok {
        results.push(check_session(&storage).await);
        storage.close().await?;
    }
    results.push(check_bridge(config).await);

    println!();
    println!("  herald doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", render_line(result, use_color));
    }
    println!();

    let issues = results
        .iter()
        .filter(|r| r.status != CheckStatus::Pass)
        .count();
    match issues {
        0 => println!("  All checks passed."),
        1 => println!("  1 issue found."),
        n => println!("  {n} issues found."),
    }
    println!();

    Ok(results.iter().all(|r| r.status != CheckStatus::Fail))
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    let (symbol, message) = match (result.status, use_color) {
        (CheckStatus::Pass, true) => ("✓".green().to_string(), result.message.clone()),
        (CheckStatus::Warn, true) => ("!".yellow().to_string(), result.message.yellow().to_string()),
        (CheckStatus::Fail, true) => ("✗".red().to_string(), result.message.red().to_string()),
        (CheckStatus::Pass, false) => ("[OK]  ".to_string(), result.message.clone()),
        (CheckStatus::Warn, false) => ("[WARN]".to_string(), result.message.clone()),
        (CheckStatus::Fail, false) => ("[FAIL]".to_string(), result.message.clone()),
    };
    format!("    {symbol} {:<12} {message} ({duration_ms}ms)", result.name)
}

async fn check_session(storage: &SqliteStorage) -> CheckResult {
    let start = Instant::now();
    let credentials = storage.read_key(CREDENTIALS_KEY).await;
    let owner = storage.read_key(OWNER_KEY).await;
    match (credentials, owner) {
        (Ok(Some(_)), Ok(Some(owner))) => CheckResult::new(
            "Session",
            CheckStatus::Pass,
            format!("paired, last held by {owner}"),
            start,
        ),
        (Ok(Some(_)), Ok(None)) => CheckResult::new("Session", CheckStatus::Pass, "paired", start),
        (Ok(None), Ok(_)) => CheckResult::new(
            "Session",
            CheckStatus::Warn,
            "not paired; `herald serve` will show a pairing code",
            start,
        ),
        (Err(e), _) | (_, Err(e)) => {
            CheckResult::new("Session", CheckStatus::Fail, e.to_string(), start)
        }
    }
}

async fn check_bridge(config: &HeraldConfig) -> CheckResult {
    let start = Instant::now();
    let bridge = BridgeTransport::from_config(&config.transport);
    match bridge.health_check().await {
        Ok(HealthStatus::Healthy) => CheckResult::new(
            "Bridge",
            CheckStatus::Pass,
            format!("reachable at {}", bridge.url()),
            start,
        ),
        Ok(HealthStatus::Degraded(reason)) => {
            CheckResult::new("Bridge", CheckStatus::Warn, reason, start)
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            CheckResult::new("Bridge", CheckStatus::Fail, reason, start)
        }
        Err(e) => CheckResult::new("Bridge", CheckStatus::Fail, e.to_string(), start),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_use_text_markers() {
        let result = CheckResult {
            name: "Bridge",
            status: CheckStatus::Fail,
            message: "connection refused".into(),
            duration: Duration::from_millis(12),
        };
        assert_eq!(
            render_line(&result, false),
            "    [FAIL] Bridge       connection refused (12ms)"
        );
    }

    #[tokio::test]
    async fn unpaired_store_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = HeraldConfig::default();
        config.storage.database_path = dir.path().join("herald.db").to_string_lossy().to_string();
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await.unwrap();

        let result = check_session(&storage).await;
        assert_eq!(result.status, CheckStatus::Warn);

        storage.write_key(CREDENTIALS_KEY, "{}").await.unwrap();
        let result = check_session(&storage).await;
        assert_eq!(result.status, CheckStatus::Pass);
        storage.close().await.unwrap();
    }
}
