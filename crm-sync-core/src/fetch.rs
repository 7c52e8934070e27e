//! Exhaustive retrieval of one resource from a cursor-paginated API.
//!
//! [`fetch_all`] follows continuation cursors until the API stops returning
//! one. [`fetch_windowed`] wraps it for endpoints that cap the time span of a
//! single query: it slides a fixed-size window across the requested history
//! and runs one paginated fetch per window.
//!
//! Requests are issued strictly one after another. Any error aborts the whole
//! fetch and discards what was accumulated so far.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::contract::{QueryParams, Resource, SourceApi};
use crate::error::FetchError;

/// One decoded response: the records it carried and the cursor for the next page.
#[derive(Debug)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub cursor: Option<String>,
}

impl<T: DeserializeOwned> Page<T> {
    /// Decode a response body for `resource`.
    ///
    /// A missing record key is an empty page. A cursor that is absent, null or
    /// empty marks the last page.
    pub fn from_body(resource: Resource, mut body: Value) -> Result<Self, FetchError> {
        let records = match body.get_mut(resource.response_key()).map(Value::take) {
            None | Some(Value::Null) => Vec::new(),
            Some(items) => serde_json::from_value(items)
                .map_err(|source| FetchError::Decode { resource, source })?,
        };
        let cursor = body
            .get("cursor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_owned);
        Ok(Page { records, cursor })
    }
}

/// Fetch every record of `resource`, following cursors until exhausted.
///
/// `params` are sent with every request; the cursor received from one page is
/// appended unchanged to the next request.
pub async fn fetch_all<A, T>(
    api: &A,
    resource: Resource,
    params: &[(String, String)],
) -> Result<Vec<T>, FetchError>
where
    A: SourceApi + ?Sized,
    T: DeserializeOwned,
{
    let mut all = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let mut request: QueryParams = params.to_vec();
        if let Some(c) = &cursor {
            request.push(("cursor".to_string(), c.clone()));
        }

        let body = api.get_page(resource, &request).await.map_err(|e| {
            error!(%resource, page = pages + 1, error = %e, "[FETCH][ERROR] Page request failed");
            e
        })?;
        let page = Page::<T>::from_body(resource, body)?;
        pages += 1;
        debug!(
            %resource,
            page = pages,
            records = page.records.len(),
            has_cursor = page.cursor.is_some(),
            "[FETCH] Page received"
        );
        all.extend(page.records);

        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    info!(%resource, pages, records = all.len(), "[FETCH] Pagination complete");
    Ok(all)
}

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Split `[history_start, history_end)` into contiguous windows of at most `size`.
///
/// The last window is clipped to `history_end`. An empty or inverted range
/// yields no windows.
pub fn windows(
    history_start: DateTime<Utc>,
    history_end: DateTime<Utc>,
    size: Duration,
) -> Result<Vec<TimeWindow>, FetchError> {
    if size <= Duration::zero() {
        return Err(FetchError::InvalidWindow(size));
    }
    let mut out = Vec::new();
    let mut start = history_start;
    while start < history_end {
        let end = start
            .checked_add_signed(size)
            .map_or(history_end, |e| e.min(history_end));
        out.push(TimeWindow { start, end });
        start = end;
    }
    Ok(out)
}

/// RFC 3339 in UTC with a `Z` suffix and whole seconds, as the API expects.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Fetch every record of `resource` between `history_start` and `history_end`,
/// one paginated fetch per window.
///
/// Records are concatenated in window order. No deduplication happens across
/// windows; the upstream API is trusted to place each record in exactly one.
pub async fn fetch_windowed<A, T>(
    api: &A,
    resource: Resource,
    params: &[(String, String)],
    history_start: DateTime<Utc>,
    history_end: DateTime<Utc>,
    window_size: Duration,
) -> Result<Vec<T>, FetchError>
where
    A: SourceApi + ?Sized,
    T: DeserializeOwned,
{
    let (min_param, max_param) = resource
        .window_params()
        .ok_or(FetchError::Unwindowed(resource))?;
    let plan = windows(history_start, history_end, window_size)?;
    info!(
        %resource,
        windows = plan.len(),
        from = %format_timestamp(history_start),
        to = %format_timestamp(history_end),
        "[FETCH] Starting windowed fetch"
    );

    let mut all = Vec::new();
    for (i, window) in plan.iter().enumerate() {
        let mut request: QueryParams = params.to_vec();
        request.push((min_param.to_string(), format_timestamp(window.start)));
        request.push((max_param.to_string(), format_timestamp(window.end)));

        let records: Vec<T> = fetch_all(api, resource, &request).await?;
        debug!(
            %resource,
            window = i + 1,
            start = %format_timestamp(window.start),
            end = %format_timestamp(window.end),
            records = records.len(),
            "[FETCH] Window complete"
        );
        all.extend(records);
    }

    info!(%resource, records = all.len(), "[FETCH] Windowed fetch complete");
    Ok(all)
}
