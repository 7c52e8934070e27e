//! The four pipeline steps. Each one is independently runnable; snapshots on
//! disk are the only thing passed between them.
//!
//! - [`fetch_customers`]: all customers, cursor-paginated.
//! - [`fetch_bookings`]: all bookings, windowed over the configured history.
//! - [`fetch_payments`]: all payments since the configured begin time.
//! - [`write_sheet`]: load snapshots, merge activity, replace the sheet tab.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::SyncConfig;
use crate::contract::{QueryParams, Resource, SourceApi, TabularDestination};
use crate::error::PipelineError;
use crate::fetch::{fetch_all, fetch_windowed, format_timestamp};
use crate::merge::{merge, MergeReport};
use crate::models::{Booking, Customer, Payment, COLUMNS};
use crate::snapshot::{read_snapshot, write_snapshot};
use crate::synchronise::{sync, SyncReport};

/// Result of a fetch step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub resource: Resource,
    pub records: usize,
    pub snapshot: std::path::PathBuf,
}

/// Result of the write step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub merge: MergeReport,
    pub sync: SyncReport,
}

fn limit_param(config: &SyncConfig) -> (String, String) {
    ("limit".to_string(), config.square.page_limit.to_string())
}

pub async fn fetch_customers<A>(api: &A, config: &SyncConfig) -> Result<FetchReport, PipelineError>
where
    A: SourceApi + ?Sized,
{
    config.validate_square()?;
    let params: QueryParams = vec![limit_param(config)];
    let customers: Vec<Customer> = fetch_all(api, Resource::Customers, &params).await?;
    let snapshot = write_snapshot(&config.snapshot_dir, Resource::Customers, &customers)?;
    Ok(FetchReport {
        resource: Resource::Customers,
        records: customers.len(),
        snapshot,
    })
}

/// Fetch bookings from the configured history start up to `now` plus the
/// configured lookahead, so scheduled appointments are included.
pub async fn fetch_bookings<A>(
    api: &A,
    config: &SyncConfig,
    now: DateTime<Utc>,
) -> Result<FetchReport, PipelineError>
where
    A: SourceApi + ?Sized,
{
    config.validate_square()?;
    let params: QueryParams = vec![limit_param(config)];
    let bookings: Vec<Booking> = fetch_windowed(
        api,
        Resource::Bookings,
        &params,
        config.bookings.history_start,
        config.bookings.history_end(now),
        config.bookings.window(),
    )
    .await?;
    let snapshot = write_snapshot(&config.snapshot_dir, Resource::Bookings, &bookings)?;
    Ok(FetchReport {
        resource: Resource::Bookings,
        records: bookings.len(),
        snapshot,
    })
}

pub async fn fetch_payments<A>(api: &A, config: &SyncConfig) -> Result<FetchReport, PipelineError>
where
    A: SourceApi + ?Sized,
{
    config.validate_square()?;
    let params: QueryParams = vec![
        limit_param(config),
        (
            "begin_time".to_string(),
            format_timestamp(config.payments.begin_time),
        ),
    ];
    let payments: Vec<Payment> = fetch_all(api, Resource::Payments, &params).await?;
    let snapshot = write_snapshot(&config.snapshot_dir, Resource::Payments, &payments)?;
    Ok(FetchReport {
        resource: Resource::Payments,
        records: payments.len(),
        snapshot,
    })
}

/// Read all three snapshots, derive `last_booked_date`, and replace the sheet tab.
///
/// All snapshots are loaded before the destination is touched, so a missing
/// precondition never leaves the sheet cleared.
pub async fn write_sheet<D>(destination: &D, config: &SyncConfig) -> Result<WriteReport, PipelineError>
where
    D: TabularDestination + ?Sized,
{
    config.validate_sheet()?;
    let customers: Vec<Customer> = read_snapshot(&config.snapshot_dir, Resource::Customers)?;
    let bookings: Vec<Booking> = read_snapshot(&config.snapshot_dir, Resource::Bookings)?;
    let payments: Vec<Payment> = read_snapshot(&config.snapshot_dir, Resource::Payments)?;

    let (customers, merge_report) = merge(customers, &bookings, &payments);
    let sync_report = sync(destination, config.sheet.tab_index, &customers, &COLUMNS).await?;
    info!(
        rows_written = sync_report.rows_written,
        tab = %sync_report.tab_name,
        "[SYNC] Sheet written"
    );
    Ok(WriteReport {
        merge: merge_report,
        sync: sync_report,
    })
}
