// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `herald campaign` subcommands.
//!
//! These write to the store; a serving process picks the changes up on its
//! next dispatch tick or idle check.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use herald_config::model::HeraldConfig;
use herald_core::{HeraldError, SystemClock};
use herald_dispatch::report::{self, HISTORY_LIMIT};
use herald_dispatch::{ColumnMapping, ImportRow, StoreControl};
use herald_storage::SqliteStorage;

#[derive(Subcommand, Debug)]
pub enum CampaignCommand {
    /// Create a running campaign from a CSV file of contacts.
    Create {
        /// Campaign name shown in status and history.
        #[arg(long)]
        name: String,
        /// Message template with `{variable}` placeholders and `{a|b}` option groups.
        #[arg(long, required_unless_present = "template_file", conflicts_with = "template_file")]
        template: Option<String>,
        /// Read the template from a file instead.
        #[arg(long, value_name = "PATH")]
        template_file: Option<PathBuf>,
        /// CSV file with a header row.
        #[arg(long, value_name = "PATH")]
        csv: PathBuf,
        /// Field delimiter of the CSV file.
        #[arg(long, default_value_t = ',')]
        delimiter: char,
        /// Map a CSV header to a template variable, or to `phone` / `ignore`.
        #[arg(long = "map", value_name = "HEADER=TARGET", value_parser = parse_mapping)]
        mappings: Vec<(String, String)>,
    },
    /// List recent campaigns.
    List,
    /// Pause every running campaign.
    Pause,
    /// Resume the latest unfinished campaign.
    Resume,
    /// Pause the latest campaign if running, resume it otherwise.
    Toggle,
    /// Stop every running campaign.
    Stop,
    /// Delete a campaign and its contacts.
    Delete {
        /// Campaign id.
        id: String,
    },
    /// Have the serving process send a one-off test message.
    Test {
        /// Recipient phone number, any formatting.
        phone: String,
        /// Message text.
        text: String,
    },
}

/// Parse a `HEADER=TARGET` column mapping argument.
pub fn parse_mapping(raw: &str) -> Result<(String, String), String> {
    let (header, target) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected HEADER=TARGET, got `{raw}`"))?;
    let (header, target) = (header.trim(), target.trim());
    if header.is_empty() || target.is_empty() {
        return Err(format!("expected HEADER=TARGET, got `{raw}`"));
    }
    Ok((header.to_string(), target.to_string()))
}

/// Read CSV rows keyed by the header row. Short records keep the columns
/// they have.
pub fn read_rows<R: Read>(input: R, delimiter: u8) -> Result<Vec<ImportRow>, HeraldError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);
    let headers = reader.headers().map_err(csv_error)?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(headers.iter().zip(record.iter()).collect());
    }
    Ok(rows)
}

fn csv_error(e: csv::Error) -> HeraldError {
    HeraldError::Config(format!("invalid contacts file: {e}"))
}

fn read_csv_file(path: &Path, delimiter: char) -> Result<Vec<ImportRow>, HeraldError> {
    let delimiter = u8::try_from(delimiter)
        .map_err(|_| HeraldError::Config(format!("delimiter `{delimiter}` is not a single byte")))?;
    let file = std::fs::File::open(path).map_err(|e| {
        HeraldError::Config(format!("cannot open contacts file {}: {e}", path.display()))
    })?;
    read_rows(file, delimiter)
}

pub async fn run(
    command: CampaignCommand,
    config: &HeraldConfig,
    storage: Arc<SqliteStorage>,
) -> Result<(), HeraldError> {
    let control = StoreControl::new(storage.clone(), storage.clone(), Arc::new(SystemClock));

    match command {
        CampaignCommand::Create {
            name,
            template,
            template_file,
            csv,
            delimiter,
            mappings,
        } => {
            let template = match (template, template_file) {
                (Some(template), _) => template,
                (None, Some(path)) => std::fs::read_to_string(&path).map_err(|e| {
                    HeraldError::Config(format!("cannot read template {}: {e}", path.display()))
                })?,
                (None, None) => return Err(HeraldError::Config("a template is required".into())),
            };
            let rows = read_csv_file(&csv, delimiter)?;
            let mapping: ColumnMapping = mappings.into_iter().collect();
            let campaign = control
                .create_campaign(&name, &template, &rows, Some(&mapping))
                .await?;
            println!(
                "Created campaign {} with {} contacts; it starts on the next idle check.",
                campaign.id,
                rows.len()
            );
        }
        CampaignCommand::List => {
            let history = report::history(storage.as_ref(), HISTORY_LIMIT).await?;
            if history.is_empty() {
                println!("No campaigns.");
            }
            for summary in history {
                println!(
                    "{}  {:<9}  {:>5}/{:<5}  {}",
                    summary.campaign.id,
                    summary.campaign.status.to_string(),
                    summary.sent(),
                    summary.total(),
                    summary.campaign.name
                );
            }
        }
        CampaignCommand::Pause => {
            let paused = control.pause().await?;
            println!("Paused {paused} campaign(s).");
        }
        CampaignCommand::Resume => {
            let campaign = control.resume().await?;
            println!("Campaign {} is running.", campaign.id);
        }
        CampaignCommand::Toggle => {
            let campaign = control.toggle().await?;
            println!("Campaign {} is {}.", campaign.id, campaign.status);
        }
        CampaignCommand::Stop => {
            let stopped = control.stop().await?;
            println!("Stopped {stopped} campaign(s).");
        }
        CampaignCommand::Delete { id } => {
            if !control.delete_campaign(&id).await? {
                return Err(HeraldError::CampaignNotFound(id));
            }
            println!("Deleted campaign {id}.");
        }
        CampaignCommand::Test { phone, text } => {
            control.request_test_message(&phone, &text).await?;
            println!(
                "Test message queued; the serving process sends it within {}s.",
                config.scheduler.idle_poll_secs
            );
        }
    }
    Ok(())
}
