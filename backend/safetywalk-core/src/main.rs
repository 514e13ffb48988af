// src/main.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod credentials;
mod date_range;
mod notifier;
mod pending_extractor;
mod runner;
mod sheets_client;
mod week_locator;


use runner::{RunOptions, RunOutcome};

/// Checks this week's Safety Walk report and alerts the group about pending leads.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// CSV file mapping lead names to chat user IDs (`name,id`)
    #[arg(long, value_name = "FILE")]
    roster: Option<PathBuf>,

    /// Evaluate the sheet as if today were this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    today: Option<NaiveDate>,

    /// Compose the alert and log it instead of posting it
    #[arg(long)]
    dry_run: bool,

    /// Read variables from this file instead of ./.env
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Setting tracing subscriber failed")?;

    config::load_env_file(cli.env_file.as_deref());

    info!("Checking secrets and settings...");
    let options = RunOptions {
        today: cli.today,
        roster_path: cli.roster,
        dry_run: cli.dry_run,
    };

    // Every outcome, failures included, ends here as a log line; the exit code stays 0.
    match runner::run_with_vars(config::utf8_vars(std::env::vars_os()), options).await {
        Ok(RunOutcome::NoActiveWeek(reason)) => info!("Nothing to check: {}", reason),
        Ok(RunOutcome::NothingPending { week_label }) => {
            info!("All good! No pending Safety Walk for '{}'.", week_label)
        }
        Ok(RunOutcome::Notified { pending, mentioned }) => {
            info!("Alert sent: {} pending, {} mentioned.", pending, mentioned)
        }
        Ok(RunOutcome::DryRun { .. }) => info!("Dry run finished; nothing was sent."),
        Ok(RunOutcome::DeliveryFailed { pending, reason }) => {
            error!("Alert for {} pending lead(s) was not delivered: {}", pending, reason)
        }
        Err(e) => error!("Run aborted. {}", e),
    }

    Ok(())
}
