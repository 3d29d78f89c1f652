// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Herald - paced campaign dispatch over a chat network bridge.
//!
//! `herald serve` owns the transport session and runs the dispatch loop. Every
//! other command works on the store, which the serving process watches.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod campaign;
mod doctor;
mod serve;
mod shutdown;
mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use herald_config::model::HeraldConfig;
use herald_config::{ConfigError, render_errors};
use herald_core::{HeraldError, StorageAdapter, SystemClock};
use herald_dispatch::StoreControl;
use herald_storage::SqliteStorage;

use crate::campaign::CampaignCommand;

/// Herald - paced campaign dispatch over a chat network bridge.
#[derive(Parser, Debug)]
#[command(name = "herald", version, about, long_about = None)]
struct Cli {
    /// Load this configuration file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Hold the transport session and dispatch running campaigns.
    Serve,
    /// Create and steer campaigns.
    Campaign {
        #[command(subcommand)]
        action: CampaignCommand,
    },
    /// Show the session, today's usage, and the latest campaign.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Show recent campaigns with their totals.
    History {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Manage phones that must never be messaged.
    Blacklist {
        #[command(subcommand)]
        action: BlacklistCommand,
    },
    /// Ignore the daily cap for the rest of the day.
    ForceContinue,
    /// Wipe the session credentials and pair again.
    ResetSession,
    /// Check the store, the bridge, and the session.
    Doctor {
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
}

#[derive(Subcommand, Debug)]
enum BlacklistCommand {
    /// Blacklist a phone and drop it from pending contacts.
    Add {
        /// Phone number, any formatting.
        phone: String,
        /// Reason stored with the entry.
        #[arg(long, default_value = "manual")]
        reason: String,
    },
    /// List blacklisted phones.
    List,
}

fn load_config(path: Option<&Path>) -> Result<HeraldConfig, Vec<ConfigError>> {
    match path {
        Some(path) => herald_config::load_and_validate_path(path),
        None => herald_config::load_and_validate(),
    }
}

async fn open_storage(config: &HeraldConfig) -> Result<Arc<SqliteStorage>, HeraldError> {
    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    Ok(storage)
}

fn store_control(storage: &Arc<SqliteStorage>) -> StoreControl {
    StoreControl::new(storage.clone(), storage.clone(), Arc::new(SystemClock))
}

/// Run a store-level command and close the store afterwards.
async fn run_offline(command: Commands, config: &HeraldConfig) -> Result<i32, HeraldError> {
    let storage = open_storage(config).await?;
    let result = run_store_command(command, config, storage.clone()).await;
    storage.close().await?;
    result.map(|()| 0)
}

async fn run_store_command(
    command: Commands,
    config: &HeraldConfig,
    storage: Arc<SqliteStorage>,
) -> Result<(), HeraldError> {
    match command {
        Commands::Campaign { action } => campaign::run(action, config, storage).await,
        Commands::Status { json, plain } => status::run_status(config, storage, json, plain).await,
        Commands::History { json, plain } => status::run_history(storage, json, plain).await,
        Commands::Blacklist {
            action: BlacklistCommand::Add { phone, reason },
        } => {
            let swept = store_control(&storage).blacklist(&phone, &reason).await?;
            println!("Blacklisted {phone}; {swept} pending contact(s) dropped.");
            Ok(())
        }
        Commands::Blacklist {
            action: BlacklistCommand::List,
        } => {
            print!("{}", status::render_blacklist(&storage.list_blacklist().await?));
            Ok(())
        }
        Commands::ForceContinue => {
            store_control(&storage).request_force_continue().await?;
            println!(
                "Force-continue requested; the serving process applies it within {}s.",
                config.scheduler.idle_poll_secs
            );
            Ok(())
        }
        Commands::ResetSession => {
            store_control(&storage).request_reset_session().await?;
            println!(
                "Session reset requested; the serving process applies it within {}s.",
                config.scheduler.idle_poll_secs
            );
            Ok(())
        }
        Commands::Serve | Commands::Doctor { .. } => Err(HeraldError::Internal(
            "command does not run against the store alone".into(),
        )),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Doctor { plain }) => doctor::run_doctor(&config, plain)
            .await
            .map(|healthy| if healthy { 0 } else { 1 }),
        Some(command) => run_offline(command, &config).await,
        None => {
            println!("herald: use --help for available commands");
            Ok(0)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("herald: {e}");
            std::process::exit(1);
        }
    }
}
