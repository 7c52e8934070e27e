//! # Square API client
//!
//! Implements [`SourceApi`] against the Square REST API with `reqwest`.
//! Every request carries the bearer token, the pinned `Square-Version`
//! header and a JSON content type. Any non-success status is returned as
//! [`FetchError::Status`] with the raw response body; nothing is retried.

use async_trait::async_trait;
use crm_sync_core::config::SquareConfig;
use crm_sync_core::contract::{Resource, SourceApi};
use crm_sync_core::error::FetchError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

pub struct SquareClient {
    http: reqwest::Client,
    base_url: String,
}

impl SquareClient {
    pub fn new(config: &SquareConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.access_token.trim()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert("Square-Version", HeaderValue::from_str(&config.api_version)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder().default_headers(headers).build()?;
        tracing::info!(
            base_url = %config.base_url,
            api_version = %config.api_version,
            "Initialized SquareClient"
        );
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SourceApi for SquareClient {
    async fn get_page(
        &self,
        resource: Resource,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, FetchError> {
        let url = format!("{}/{}", self.base_url, resource.path());
        tracing::debug!(%url, params = params.len(), "Requesting Square page");

        let response = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, %url, "Failed to reach Square API");
                FetchError::Transport {
                    resource,
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            tracing::error!(error = ?e, status = %status, %url, "Failed to read Square response body");
            FetchError::Transport {
                resource,
                message: format!("failed to read response body (status {status}): {e}"),
            }
        })?;
        if !status.is_success() {
            tracing::error!(
                status = %status,
                %url,
                "Square API returned error. Response body: {text}"
            );
            return Err(FetchError::Status {
                resource,
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|source| {
            tracing::error!(error = %source, %url, "Square API returned invalid JSON");
            FetchError::Decode { resource, source }
        })
    }
}
