/// `load_config` module: builds the run's [`SyncConfig`] from an optional static
/// YAML file plus secrets taken from the environment.
///
/// # Responsibilities
/// - Parse the user-supplied YAML (no secrets) into typed sections; every key is optional
/// - Inject `SQUARE_API_TOKEN`, `GOOGLE_SHEET_ID` and `GOOGLE_SHEET_INDEX` from the environment
/// - Leave per-step validation to [`SyncConfig::validate_square`] and
///   [`SyncConfig::validate_sheet`], so a fetch step never fails for a missing sheet id
///
/// # Errors
/// Read and parse failures are [`ConfigError`]s; the CLI adds context with `anyhow`.
use chrono::{DateTime, Utc};
use crm_sync_core::config::SyncConfig;
use crm_sync_core::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const ENV_SQUARE_TOKEN: &str = "SQUARE_API_TOKEN";
pub const ENV_SHEET_ID: &str = "GOOGLE_SHEET_ID";
pub const ENV_SHEET_INDEX: &str = "GOOGLE_SHEET_INDEX";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub snapshot_dir: Option<PathBuf>,
    #[serde(default)]
    pub square: SquareSection,
    #[serde(default)]
    pub bookings: BookingsSection,
    #[serde(default)]
    pub payments: PaymentsSection,
    #[serde(default)]
    pub sheet: SheetSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SquareSection {
    pub base_url: Option<String>,
    pub api_version: Option<String>,
    pub page_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookingsSection {
    pub history_start: Option<DateTime<Utc>>,
    pub window_days: Option<i64>,
    pub lookahead_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaymentsSection {
    pub begin_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetSection {
    pub tab_index: Option<usize>,
    pub base_url: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub token_path: Option<PathBuf>,
}

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse the YAML file at `path`.
pub fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    info!(config_path = ?path, "Loading configuration from file");
    let content = fs::read_to_string(path).map_err(|source| {
        error!(error = ?source, config_path = ?path, "Failed to read config file");
        ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?;
    // An empty file parses as YAML null; treat it as "all defaults".
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
        ConfigError::Parse(e.to_string())
    })
}

/// Defaults, overlaid with the optional YAML file, overlaid with environment secrets.
pub fn load_config(path: Option<&Path>) -> Result<SyncConfig, ConfigError> {
    let file = match path {
        Some(p) => read_file_config(p)?,
        None => FileConfig::default(),
    };

    let mut config = SyncConfig::default();
    if let Some(dir) = file.snapshot_dir {
        config.snapshot_dir = dir;
    }

    let square = file.square;
    if let Some(v) = square.base_url {
        config.square.base_url = v;
    }
    if let Some(v) = square.api_version {
        config.square.api_version = v;
    }
    if let Some(v) = square.page_limit {
        config.square.page_limit = v;
    }
    if let Some(v) = file.bookings.history_start {
        config.bookings.history_start = v;
    }
    if let Some(v) = file.bookings.window_days {
        config.bookings.window_days = v;
    }
    if let Some(v) = file.bookings.lookahead_days {
        config.bookings.lookahead_days = v;
    }
    if let Some(v) = file.payments.begin_time {
        config.payments.begin_time = v;
    }

    let sheet = file.sheet;
    if let Some(v) = sheet.tab_index {
        config.sheet.tab_index = v;
    }
    if let Some(v) = sheet.base_url {
        config.sheet.base_url = v;
    }
    if let Some(v) = sheet.credentials_path {
        config.sheet.credentials_path = v;
    }
    if let Some(v) = sheet.token_path {
        config.sheet.token_path = v;
    }

    if let Some(token) = env_trimmed(ENV_SQUARE_TOKEN) {
        info!("{ENV_SQUARE_TOKEN} found in env");
        config.square.access_token = token;
    }
    if let Some(id) = env_trimmed(ENV_SHEET_ID) {
        config.sheet.sheet_id = id;
    }
    if let Some(raw) = env_trimmed(ENV_SHEET_INDEX) {
        config.sheet.tab_index = raw.parse().map_err(|e| {
            error!(error = ?e, raw = %raw, "{ENV_SHEET_INDEX} must be a non-negative integer");
            ConfigError::Invalid {
                key: ENV_SHEET_INDEX,
                reason: format!("expected a non-negative integer, got {raw:?}"),
            }
        })?;
    }

    config.trace_loaded();
    Ok(config)
}
