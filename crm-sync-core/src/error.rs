//! Error types shared by the fetch, merge, snapshot and sync stages.
//!
//! Every variant is fatal to the step that raised it. Nothing here is retried;
//! callers log and surface the error, and the CLI turns it into a non-zero exit.

use std::path::PathBuf;

use thiserror::Error;

use crate::contract::Resource;

/// A required setting is absent or malformed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is missing or empty. {hint}")]
    Missing { key: &'static str, hint: &'static str },

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config YAML: {0}")]
    Parse(String),
}

/// Failure while pulling records from the source API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{resource} request returned status {status}: {body}")]
    Status {
        resource: Resource,
        status: u16,
        body: String,
    },

    #[error("{resource} request failed: {message}")]
    Transport { resource: Resource, message: String },

    #[error("{resource} response could not be decoded: {source}")]
    Decode {
        resource: Resource,
        #[source]
        source: serde_json::Error,
    },

    #[error("window size must be positive, got {0}")]
    InvalidWindow(chrono::Duration),

    #[error("{0} has no time-bound query parameters and cannot be fetched in windows")]
    Unwindowed(Resource),
}

/// Failure reading or writing an intermediate snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("{path:?} not found. Run `crm-sync {step}` first.")]
    Missing { path: PathBuf, step: &'static str },

    #[error("snapshot I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {path:?} is not a valid JSON array: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode snapshot {path:?}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure obtaining an access token for the destination.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no usable access token in {token_path:?}. {hint}")]
    AuthorizationRequired { token_path: PathBuf, hint: String },

    #[error("client secrets file {0:?} not found. Create an OAuth client and download it there.")]
    MissingClientSecrets(PathBuf),

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("token cache I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure talking to the tabular destination.
#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("tab index {index} requested but the spreadsheet only has {count} tab(s)")]
    TabOutOfRange { index: usize, count: usize },

    #[error("destination returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("destination request failed: {0}")]
    Transport(String),

    #[error("destination response could not be decoded: {0}")]
    Decode(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Any failure of one pipeline step.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Destination(#[from] DestinationError),
}
