//! Google Sheets v4 adapter for [`TabularDestination`].
//!
//! Talks to the REST API directly with `reqwest`, authenticating each request
//! with a bearer token from a [`TokenProvider`]. Ranges arrive in A1 notation
//! and are percent-encoded into the request path.

use async_trait::async_trait;
use crm_sync_core::config::SheetConfig;
use crm_sync_core::contract::{TabularDestination, TokenProvider};
use crm_sync_core::error::DestinationError;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};

pub struct SheetsClient {
    http: reqwest::Client,
    base_url: Url,
    sheet_id: String,
    tokens: Box<dyn TokenProvider>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateValuesResponse {
    #[serde(default)]
    updated_rows: usize,
}

impl SheetsClient {
    pub fn new(config: &SheetConfig, tokens: Box<dyn TokenProvider>) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        tracing::info!(
            sheet_id = %config.sheet_id,
            base_url = %base_url,
            "Initialized SheetsClient"
        );
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            sheet_id: config.sheet_id.clone(),
            tokens,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, DestinationError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DestinationError::Transport(format!("invalid base URL {}", self.base_url)))?
            .pop_if_empty()
            .push(&self.sheet_id)
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<String, DestinationError> {
        let token = self.tokens.get_token().await?;
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(token.secret());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = ?e, %url, "Failed to reach Sheets API");
            DestinationError::Transport(e.to_string())
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
        if !status.is_success() {
            tracing::error!(%method, %url, status = %status, "Sheets API returned error. Response body: {text}");
            return Err(DestinationError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    fn decode<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, DestinationError> {
        serde_json::from_str(text).map_err(|e| DestinationError::Decode(e.to_string()))
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TabularDestination for SheetsClient {
    async fn tab_titles(&self) -> Result<Vec<String>, DestinationError> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");
        let text = self.send(Method::GET, url, None).await?;
        let meta: SpreadsheetMeta = Self::decode(&text)?;
        let titles: Vec<String> = meta.sheets.into_iter().map(|s| s.properties.title).collect();
        tracing::info!(tabs = titles.len(), "Fetched spreadsheet tabs");
        Ok(titles)
    }

    async fn get_range(&self, range: &str) -> Result<Vec<Vec<String>>, DestinationError> {
        let url = self.url(&["values", range])?;
        let text = self.send(Method::GET, url, None).await?;
        let body: ValueRange = Self::decode(&text)?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn clear_range(&self, range: &str) -> Result<(), DestinationError> {
        let url = self.url(&["values", &format!("{range}:clear")])?;
        self.send(Method::POST, url, Some(json!({}))).await?;
        tracing::info!(range, "Cleared range");
        Ok(())
    }

    async fn write_range(
        &self,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<usize, DestinationError> {
        let mut url = self.url(&["values", range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        });
        let text = self.send(Method::PUT, url, Some(body)).await?;
        let response: UpdateValuesResponse = Self::decode(&text)?;
        tracing::info!(range, updated_rows = response.updated_rows, "Wrote range");
        Ok(response.updated_rows)
    }
}
