//! Full-replace sync of customer rows into one tab of a tabular destination.
//!
//! The tab is cleared and rewritten on every run: a header row built from the
//! column list, then one row per customer in the order given. Nothing is
//! appended or merged.
//!
//! # Error Handling
//! Any destination failure aborts the sync. If the clear succeeded and the
//! write then fails, the tab is left empty; this is logged and surfaced, and no
//! rollback is attempted.
//!
//! # Navigation
//! - Main entrypoint: [`sync`]
//! - Range helpers: [`quote_tab`], [`resolve_tab`]

use tracing::{error, info, warn};

use crate::contract::TabularDestination;
use crate::error::DestinationError;
use crate::models::Customer;

/// Outcome of one sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub tab_name: String,
    /// Rows (header included) present before the clear.
    pub rows_replaced: usize,
    /// Customer rows written, not counting the header.
    pub rows_written: usize,
}

/// A1 prefix for `tab`, single-quoted with embedded quotes doubled.
pub fn quote_tab(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}

/// Title of the tab at `index`.
pub async fn resolve_tab<D>(destination: &D, index: usize) -> Result<String, DestinationError>
where
    D: TabularDestination + ?Sized,
{
    let titles = destination.tab_titles().await?;
    let count = titles.len();
    titles.into_iter().nth(index).ok_or_else(|| {
        error!(index, count, "[SYNC][ERROR] Tab index out of range");
        DestinationError::TabOutOfRange { index, count }
    })
}

/// Header row followed by one row per customer.
pub fn build_rows(customers: &[Customer], columns: &[&str]) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(customers.len() + 1);
    rows.push(columns.iter().map(|c| c.to_string()).collect());
    rows.extend(customers.iter().map(|c| c.to_row(columns)));
    rows
}

/// Replace the contents of tab `tab_index` with `columns` and `customers`.
pub async fn sync<D>(
    destination: &D,
    tab_index: usize,
    customers: &[Customer],
    columns: &[&str],
) -> Result<SyncReport, DestinationError>
where
    D: TabularDestination + ?Sized,
{
    let tab_name = resolve_tab(destination, tab_index).await?;
    let whole_tab = quote_tab(&tab_name);
    info!(tab = %tab_name, customers = customers.len(), "[SYNC] Starting full replace");

    let existing = destination.get_range(&whole_tab).await.map_err(|e| {
        error!(tab = %tab_name, error = %e, "[SYNC][ERROR] Failed to read existing contents");
        e
    })?;
    let rows_replaced = existing.len();

    destination.clear_range(&whole_tab).await.map_err(|e| {
        error!(tab = %tab_name, error = %e, "[SYNC][ERROR] Failed to clear tab");
        e
    })?;
    info!(tab = %tab_name, rows_replaced, "[SYNC] Cleared tab");

    let rows = build_rows(customers, columns);
    let start = format!("{whole_tab}!A1");
    let updated = match destination.write_range(&start, &rows).await {
        Ok(updated) => updated,
        Err(e) => {
            error!(
                tab = %tab_name,
                error = %e,
                rows_replaced,
                "[SYNC][ERROR] Write failed after clear; tab has been left empty"
            );
            return Err(e);
        }
    };
    if updated != rows.len() {
        warn!(tab = %tab_name, expected = rows.len(), updated, "[SYNC] Destination reported a different row count");
    }

    let report = SyncReport {
        tab_name,
        rows_replaced,
        rows_written: customers.len(),
    };
    info!(tab = %report.tab_name, rows_written = report.rows_written, "[SYNC] Full replace complete");
    Ok(report)
}
