///
/// This module implements the CLI for crm-sync: command parsing, client wiring
/// and the step orchestrator.
///
/// All business logic (fetching, merging, syncing) lives in the [`crm-sync-core`] crate.
/// This module is strictly glue: it loads configuration, builds the HTTP clients
/// and runs one or more pipeline steps.
///
/// ## Steps
/// - `fetch-customers`, `fetch-bookings`, `fetch-payments`: pull one resource into its snapshot
/// - `write-sheet`: merge the snapshots and replace the sheet tab
/// - `run`: all of the above in order, halting at the first failure
///
/// [`crm-sync-core`]: ../../crm-sync-core/
use crate::load_config::load_config;
use crate::sheets::SheetsClient;
use crate::square::SquareClient;
use crate::token::FileTokenProvider;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use crm_sync_core::config::SyncConfig;
use crm_sync_core::error::AuthError;
use crm_sync_core::pipeline;
use std::path::PathBuf;

/// CLI for crm-sync: copy Square customers, with their last activity date, into a Google Sheet.
#[derive(Parser)]
#[clap(
    name = "crm-sync",
    version,
    about = "Synchronise Square customers and their last booking/payment date into a Google Sheet"
)]
pub struct Cli {
    /// Optional YAML config file (no secrets; those come from the environment)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Fetch all customers into the customers snapshot
    FetchCustomers,
    /// Fetch all bookings, window by window, into the bookings snapshot
    FetchBookings,
    /// Fetch all payments into the payments snapshot
    FetchPayments,
    /// Merge the snapshots and replace the sheet tab contents
    WriteSheet,
    /// Run every step in order, stopping at the first failure
    Run,
}

/// One independently runnable pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FetchCustomers,
    FetchBookings,
    FetchPayments,
    WriteSheet,
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::FetchCustomers => "Fetching customers from Square...",
            Step::FetchBookings => "Fetching bookings from Square...",
            Step::FetchPayments => "Fetching payments from Square...",
            Step::WriteSheet => "Writing to Google Sheets...",
        }
    }
}

impl Commands {
    /// The single step this command runs, or `None` for the full pipeline.
    pub fn step(&self) -> Option<Step> {
        match self {
            Commands::FetchCustomers => Some(Step::FetchCustomers),
            Commands::FetchBookings => Some(Step::FetchBookings),
            Commands::FetchPayments => Some(Step::FetchPayments),
            Commands::WriteSheet => Some(Step::WriteSheet),
            Commands::Run => None,
        }
    }
}

/// Steps executed by `run`, in order.
pub const PIPELINE: [Step; 4] = [
    Step::FetchCustomers,
    Step::FetchBookings,
    Step::FetchPayments,
    Step::WriteSheet,
];

fn square_client(config: &SyncConfig) -> Result<SquareClient> {
    config.validate_square()?;
    SquareClient::new(&config.square).context("Failed to construct Square client")
}

/// Execute a single step.
pub async fn run_step(step: Step, config: &SyncConfig) -> Result<()> {
    match step {
        Step::FetchCustomers => {
            let api = square_client(config)?;
            let report = pipeline::fetch_customers(&api, config).await?;
            println!(
                "Fetched {} customers. Saved to {}",
                report.records,
                report.snapshot.display()
            );
        }
        Step::FetchBookings => {
            let api = square_client(config)?;
            let report = pipeline::fetch_bookings(&api, config, Utc::now()).await?;
            println!(
                "Fetched {} bookings. Saved to {}",
                report.records,
                report.snapshot.display()
            );
        }
        Step::FetchPayments => {
            let api = square_client(config)?;
            let report = pipeline::fetch_payments(&api, config).await?;
            println!(
                "Fetched {} payments. Saved to {}",
                report.records,
                report.snapshot.display()
            );
        }
        Step::WriteSheet => {
            config.validate_sheet()?;
            if !config.sheet.credentials_path.exists() {
                return Err(
                    AuthError::MissingClientSecrets(config.sheet.credentials_path.clone()).into(),
                );
            }
            let tokens = FileTokenProvider::new(
                config.sheet.token_path.clone(),
                config.sheet.credentials_path.clone(),
            );
            let destination = SheetsClient::new(&config.sheet, Box::new(tokens))
                .context("Failed to construct Sheets client")?;
            let report = pipeline::write_sheet(&destination, config).await?;
            println!(
                "Wrote {} customer row(s) to Google Sheet {} (tab: {})",
                report.sync.rows_written, config.sheet.sheet_id, report.sync.tab_name
            );
        }
    }
    Ok(())
}

/// Run every step in [`PIPELINE`], halting at the first failure.
pub async fn run_pipeline(config: &SyncConfig) -> Result<()> {
    println!("=== Square to Google Sheets Pipeline ===\n");
    let total = PIPELINE.len();
    for (i, step) in PIPELINE.iter().enumerate() {
        let n = i + 1;
        println!("[Step {n}/{total}] {}", step.label());
        tracing::info!(step = n, total, command = ?step, "Starting pipeline step");
        if let Err(e) = run_step(*step, config).await {
            tracing::error!(step = n, command = ?step, error = %e, "Pipeline step failed");
            eprintln!("\nPipeline stopped at step {n}. See error output above.");
            return Err(e.context(format!("pipeline stopped at step {n}/{total}")));
        }
        println!();
    }
    println!("=== Pipeline complete ===");
    Ok(())
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    tracing::info!(command = ?cli.command, "Starting command");

    let result = match cli.command.step() {
        Some(step) => run_step(step, &config).await,
        None => run_pipeline(&config).await,
    };

    match result {
        Ok(()) => {
            tracing::info!(command = ?cli.command, "Command complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = ?cli.command, error = %e, "Command failed");
            Err(e)
        }
    }
}
