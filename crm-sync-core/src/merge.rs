//! Derives each customer's last activity date from bookings and completed payments.
//!
//! Both sources are reduced independently to `customer_id -> latest timestamp`
//! and the more recent of the two wins. Timestamps are compared as parsed
//! instants, so differing offsets or sub-second precision order correctly; the
//! stored value is the winning record's original string.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use tracing::{info, warn};

use crate::models::{Booking, Customer, Payment};

/// Counts describing one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub customers: usize,
    pub bookings_considered: usize,
    pub payments_considered: usize,
    pub customers_with_activity: usize,
}

#[derive(Debug, Clone)]
struct Stamp {
    at: DateTime<FixedOffset>,
    raw: String,
}

/// Latest parseable timestamp per customer id.
#[derive(Debug, Default)]
pub struct ActivityIndex {
    latest: HashMap<String, Stamp>,
}

impl ActivityIndex {
    /// Record `timestamp` for `customer_id`, keeping it only if it is the newest seen.
    ///
    /// Returns false when the timestamp was ignored (empty or unparseable).
    pub fn observe(&mut self, customer_id: &str, timestamp: &str) -> bool {
        if timestamp.is_empty() {
            return false;
        }
        let at = match DateTime::parse_from_rfc3339(timestamp) {
            Ok(at) => at,
            Err(e) => {
                warn!(customer_id, timestamp, error = %e, "[MERGE] Skipping unparseable timestamp");
                return false;
            }
        };
        match self.latest.get(customer_id) {
            Some(current) if current.at >= at => {}
            _ => {
                self.latest.insert(
                    customer_id.to_string(),
                    Stamp {
                        at,
                        raw: timestamp.to_string(),
                    },
                );
            }
        }
        true
    }

    fn get(&self, customer_id: &str) -> Option<&Stamp> {
        self.latest.get(customer_id)
    }

    /// Original string of the latest timestamp for `customer_id`.
    pub fn latest(&self, customer_id: &str) -> Option<&str> {
        self.get(customer_id).map(|s| s.raw.as_str())
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

/// Index of the latest `start_at` per customer. Customer-less bookings are skipped.
pub fn last_booked(bookings: &[Booking]) -> (ActivityIndex, usize) {
    let mut index = ActivityIndex::default();
    let mut considered = 0;
    for booking in bookings {
        if let (Some(cid), Some(start)) = (&booking.customer_id, &booking.start_at) {
            if !cid.is_empty() && index.observe(cid, start) {
                considered += 1;
            }
        }
    }
    (index, considered)
}

/// Index of the latest `created_at` per customer over `COMPLETED` payments only.
pub fn last_paid(payments: &[Payment]) -> (ActivityIndex, usize) {
    let mut index = ActivityIndex::default();
    let mut considered = 0;
    for payment in payments.iter().filter(|p| p.is_completed()) {
        if let (Some(cid), Some(created)) = (&payment.customer_id, &payment.created_at) {
            if !cid.is_empty() && index.observe(cid, created) {
                considered += 1;
            }
        }
    }
    (index, considered)
}

/// Set `last_booked_date` on every customer to the more recent of their latest
/// booking and latest completed payment, or `""` when neither exists.
///
/// Activity for ids not present in `customers` is ignored.
pub fn merge(
    mut customers: Vec<Customer>,
    bookings: &[Booking],
    payments: &[Payment],
) -> (Vec<Customer>, MergeReport) {
    let (booked, bookings_considered) = last_booked(bookings);
    let (paid, payments_considered) = last_paid(payments);

    let mut with_activity = 0;
    for customer in &mut customers {
        let latest = match (booked.get(&customer.id), paid.get(&customer.id)) {
            (Some(b), Some(p)) => Some(if p.at > b.at { p } else { b }),
            (Some(b), None) => Some(b),
            (None, Some(p)) => Some(p),
            (None, None) => None,
        };
        customer.last_booked_date = latest.map(|s| s.raw.clone()).unwrap_or_default();
        if latest.is_some() {
            with_activity += 1;
        }
    }

    let report = MergeReport {
        customers: customers.len(),
        bookings_considered,
        payments_considered,
        customers_with_activity: with_activity,
    };
    info!(
        customers = report.customers,
        booked_customers = booked.len(),
        paid_customers = paid.len(),
        with_activity,
        "[MERGE] Derived last_booked_date"
    );
    (customers, report)
}
