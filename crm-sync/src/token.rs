//! # OAuth token cache for the Sheets API
//!
//! [`FileTokenProvider`] implements the load-or-refresh-and-persist pattern:
//!
//! 1. Read the cached authorized-user token from `token.json`. A cache that
//!    cannot be read or parsed is treated as absent, not as an error.
//! 2. A token that has not expired is returned as-is.
//! 3. An expired token with a refresh token is refreshed at the token
//!    endpoint, written back to `token.json` and returned.
//! 4. Otherwise [`AuthError::AuthorizationRequired`] tells the operator to
//!    authorise again. The interactive consent flow is not part of this crate.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use crm_sync_core::contract::{AccessToken, TokenProvider};
use crm_sync_core::error::AuthError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed rather than used.
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Authorized-user token file, as written by Google's client libraries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CachedToken {
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CachedToken {
    /// Parsed expiry. Accepts RFC 3339 and the offset-less UTC form Python writes.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.expiry.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc())
            })
            .ok()
    }

    /// Usable now: non-empty and not within the expiry skew.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.token.is_empty() {
            return false;
        }
        match (self.expiry.as_deref(), self.expires_at()) {
            (None, _) => true,
            (Some(_), Some(at)) => at > now + Duration::seconds(EXPIRY_SKEW_SECONDS),
            (Some(_), None) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

pub struct FileTokenProvider {
    http: reqwest::Client,
    token_path: PathBuf,
    credentials_path: PathBuf,
}

impl FileTokenProvider {
    pub fn new(token_path: impl Into<PathBuf>, credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_path: token_path.into(),
            credentials_path: credentials_path.into(),
        }
    }

    /// Cached token, or `None` when the file is absent, unreadable or malformed.
    pub fn load_cached(&self) -> Option<CachedToken> {
        let content = match fs::read_to_string(&self.token_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(error = ?e, path = %self.token_path.display(), "Token cache unreadable, ignoring it");
                return None;
            }
        };
        match serde_json::from_str::<CachedToken>(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.token_path.display(), "Token cache is malformed, ignoring it");
                None
            }
        }
    }

    fn persist(&self, token: &CachedToken) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(token)
            .map_err(|e| AuthError::Refresh(format!("failed to encode token cache: {e}")))?;
        fs::write(&self.token_path, json).map_err(|source| AuthError::Io {
            path: self.token_path.clone(),
            source,
        })?;
        tracing::info!(path = %self.token_path.display(), "Persisted refreshed token");
        Ok(())
    }

    fn client_secrets(&self, cached: &CachedToken) -> Result<ClientSecrets, AuthError> {
        if let (Some(id), Some(secret)) = (&cached.client_id, &cached.client_secret) {
            return Ok(ClientSecrets {
                client_id: id.clone(),
                client_secret: secret.clone(),
                token_uri: cached.token_uri.clone(),
            });
        }
        read_client_secrets(&self.credentials_path)
    }

    async fn refresh(&self, mut cached: CachedToken, refresh_token: &str) -> Result<CachedToken, AuthError> {
        let secrets = self.client_secrets(&cached)?;
        let token_uri = cached
            .token_uri
            .clone()
            .or(secrets.token_uri.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());
        tracing::info!(%token_uri, "Refreshing expired access token");

        let params = [
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self
            .http
            .post(&token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::error!(status = %status, "Token endpoint rejected refresh. Response body: {text}");
            return Err(AuthError::Refresh(format!("token endpoint returned {status}: {text}")));
        }
        let body: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| AuthError::Refresh(format!("invalid token response: {e}")))?;

        let expiry = match body.expires_in {
            Some(secs) => Some(
                Duration::try_seconds(secs)
                    .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        AuthError::Refresh(format!("token endpoint returned unusable expires_in {secs}"))
                    })?
                    .to_rfc3339(),
            ),
            None => None,
        };
        cached.token = body.access_token;
        cached.expiry = expiry;
        if let Some(rt) = body.refresh_token {
            cached.refresh_token = Some(rt);
        }
        if let Some(scope) = body.scope {
            cached.scopes = scope.split_whitespace().map(str::to_owned).collect();
        }
        cached.token_uri = Some(token_uri);
        cached.client_id = Some(secrets.client_id);
        cached.client_secret = Some(secrets.client_secret);
        self.persist(&cached)?;
        Ok(cached)
    }

    fn authorization_required(&self) -> AuthError {
        AuthError::AuthorizationRequired {
            token_path: self.token_path.clone(),
            hint: format!(
                "Authorise the OAuth client in {} for scope {SHEETS_SCOPE} and save the authorized-user token to this path.",
                self.credentials_path.display()
            ),
        }
    }
}

fn read_client_secrets(path: &Path) -> Result<ClientSecrets, AuthError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AuthError::MissingClientSecrets(path.to_path_buf()))
        }
        Err(source) => {
            return Err(AuthError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let file: ClientSecretsFile = serde_json::from_str(&content)
        .map_err(|e| AuthError::Refresh(format!("invalid client secrets file {path:?}: {e}")))?;
    file.installed
        .or(file.web)
        .ok_or_else(|| AuthError::Refresh(format!("{path:?} has no `installed` or `web` client")))
}

#[async_trait]
impl TokenProvider for FileTokenProvider {
    async fn get_token(&self) -> Result<AccessToken, AuthError> {
        let Some(cached) = self.load_cached() else {
            tracing::error!(path = %self.token_path.display(), "No cached token available");
            return Err(self.authorization_required());
        };

        if cached.is_valid_at(Utc::now()) {
            tracing::debug!("Using cached access token");
            return Ok(AccessToken::new(cached.token));
        }

        match cached.refresh_token.clone() {
            Some(refresh_token) if !refresh_token.is_empty() => {
                let refreshed = self.refresh(cached, &refresh_token).await?;
                Ok(AccessToken::new(refreshed.token))
            }
            _ => {
                tracing::error!("Cached token expired and has no refresh token");
                Err(self.authorization_required())
            }
        }
    }
}
