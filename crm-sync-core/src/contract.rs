//! # contract: seams between the core pipeline and the outside world
//!
//! The core crate never speaks HTTP. It drives three collaborators through the
//! traits below, implemented for real by the CLI crate and by `mockall` mocks
//! in tests:
//!
//! - [`SourceApi`]: one page of one resource from the point-of-sale API.
//! - [`TabularDestination`]: tab listing plus get/clear/write of a cell range.
//! - [`TokenProvider`]: a bearer token for the destination, loaded or refreshed.
//!
//! All methods are async and fail with the typed errors from [`crate::error`].
//! The traits are annotated for `mockall` so consumers can generate
//! deterministic mocks for unit and integration tests.

use std::fmt;

use async_trait::async_trait;
use mockall::automock;

use crate::error::{AuthError, DestinationError, FetchError};

/// The record collections pulled from the source API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Customers,
    Bookings,
    Payments,
}

impl Resource {
    /// Endpoint path segment, relative to the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Customers => "customers",
            Resource::Bookings => "bookings",
            Resource::Payments => "payments",
        }
    }

    /// Key holding the record array in a response body.
    pub fn response_key(&self) -> &'static str {
        self.path()
    }

    pub fn snapshot_file(&self) -> &'static str {
        match self {
            Resource::Customers => "customers.json",
            Resource::Bookings => "bookings.json",
            Resource::Payments => "payments.json",
        }
    }

    /// CLI step that produces this resource's snapshot.
    pub fn producing_step(&self) -> &'static str {
        match self {
            Resource::Customers => "fetch-customers",
            Resource::Bookings => "fetch-bookings",
            Resource::Payments => "fetch-payments",
        }
    }

    /// Lower/upper time-bound query parameter names, if the endpoint is fetched in windows.
    ///
    /// Payments accept a `begin_time` but no span cap, so they are fetched in one pass.
    pub fn window_params(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Resource::Bookings => Some(("start_at_min", "start_at_max")),
            Resource::Customers | Resource::Payments => None,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Query parameters for one request, in the order they are sent.
pub type QueryParams = Vec<(String, String)>;

/// Source of paginated records (the point-of-sale API).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Issue one GET for `resource` with `params` and return the decoded JSON body.
    ///
    /// Implementors must map any non-success status to [`FetchError::Status`]
    /// carrying the status code and response body.
    async fn get_page(
        &self,
        resource: Resource,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, FetchError>;
}

/// A spreadsheet-like destination addressed by A1 ranges.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TabularDestination: Send + Sync {
    /// Titles of all tabs, in display order.
    async fn tab_titles(&self) -> Result<Vec<String>, DestinationError>;

    /// Current cell values in `range`. An empty range yields no rows.
    async fn get_range(&self, range: &str) -> Result<Vec<Vec<String>>, DestinationError>;

    /// Remove all values in `range`.
    async fn clear_range(&self, range: &str) -> Result<(), DestinationError>;

    /// Write `rows` starting at the top-left of `range`, returning the number of rows updated.
    async fn write_range(
        &self,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<usize, DestinationError>;
}

/// Bearer token for the destination API.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(len={})", self.0.len())
    }
}

/// Supplies a currently valid access token, refreshing and persisting it when needed.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self) -> Result<AccessToken, AuthError>;
}
