use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{debug, info};

use crate::error::ConfigError;

pub const DEFAULT_SQUARE_BASE_URL: &str = "https://connect.squareup.com/v2";
pub const DEFAULT_SQUARE_VERSION: &str = "2026-01-22";
pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const DEFAULT_PAGE_LIMIT: u32 = 100;
/// Longest span the bookings endpoint accepts in one query.
pub const MAX_BOOKING_WINDOW_DAYS: i64 = 31;
/// Scheduled bookings are fetched up to this far past the run time.
pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 31;
pub const MAX_LOOKAHEAD_DAYS: i64 = 366;

/// Far enough back to cover the whole history of most sellers.
pub fn default_history_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Point-of-sale API connection.
#[derive(Clone)]
pub struct SquareConfig {
    pub base_url: String,
    pub api_version: String,
    pub access_token: String,
    pub page_limit: u32,
}

impl fmt::Debug for SquareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SquareConfig")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("access_token_set", &!self.access_token.is_empty())
            .field("page_limit", &self.page_limit)
            .finish()
    }
}

impl Default for SquareConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SQUARE_BASE_URL.to_string(),
            api_version: DEFAULT_SQUARE_VERSION.to_string(),
            access_token: String::new(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingsConfig {
    pub history_start: DateTime<Utc>,
    pub window_days: i64,
    pub lookahead_days: i64,
}

impl BookingsConfig {
    pub fn window(&self) -> Duration {
        Duration::days(self.window_days)
    }

    /// End of the fetched range: `now` plus the lookahead, so upcoming
    /// appointments are included.
    pub fn history_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_days(self.lookahead_days)
            .and_then(|ahead| now.checked_add_signed(ahead))
            .unwrap_or(now)
    }
}

impl Default for BookingsConfig {
    fn default() -> Self {
        Self {
            history_start: default_history_start(),
            window_days: MAX_BOOKING_WINDOW_DAYS,
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    pub begin_time: DateTime<Utc>,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            begin_time: default_history_start(),
        }
    }
}

/// Spreadsheet destination and its OAuth files.
#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub sheet_id: String,
    pub tab_index: usize,
    pub base_url: String,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            sheet_id: String::new(),
            tab_index: 0,
            base_url: DEFAULT_SHEETS_BASE_URL.to_string(),
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
        }
    }
}

/// Everything a run needs, built once at startup and handed to each step.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub square: SquareConfig,
    pub bookings: BookingsConfig,
    pub payments: PaymentsConfig,
    pub sheet: SheetConfig,
    pub snapshot_dir: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            square: SquareConfig::default(),
            bookings: BookingsConfig::default(),
            payments: PaymentsConfig::default(),
            sheet: SheetConfig::default(),
            snapshot_dir: PathBuf::from(".tmp"),
        }
    }
}

impl SyncConfig {
    /// Settings required by the fetch steps.
    pub fn validate_square(&self) -> Result<(), ConfigError> {
        if self.square.access_token.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "SQUARE_API_TOKEN",
                hint: "Copy .env.example to .env and paste your Square access token.",
            });
        }
        if self.square.base_url.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "square.base_url",
                hint: "Set it in the config file or remove it to use the default.",
            });
        }
        if !(1..=DEFAULT_PAGE_LIMIT).contains(&self.square.page_limit) {
            return Err(ConfigError::Invalid {
                key: "square.page_limit",
                reason: format!(
                    "must be between 1 and {DEFAULT_PAGE_LIMIT}, got {}",
                    self.square.page_limit
                ),
            });
        }
        if !(1..=MAX_BOOKING_WINDOW_DAYS).contains(&self.bookings.window_days) {
            return Err(ConfigError::Invalid {
                key: "bookings.window_days",
                reason: format!(
                    "must be between 1 and {MAX_BOOKING_WINDOW_DAYS}, got {}",
                    self.bookings.window_days
                ),
            });
        }
        if !(0..=MAX_LOOKAHEAD_DAYS).contains(&self.bookings.lookahead_days) {
            return Err(ConfigError::Invalid {
                key: "bookings.lookahead_days",
                reason: format!(
                    "must be between 0 and {MAX_LOOKAHEAD_DAYS}, got {}",
                    self.bookings.lookahead_days
                ),
            });
        }
        Ok(())
    }

    /// Settings required by the write step.
    pub fn validate_sheet(&self) -> Result<(), ConfigError> {
        if self.sheet.sheet_id.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "GOOGLE_SHEET_ID",
                hint: "Copy .env.example to .env and paste your Google Sheet ID.",
            });
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            snapshot_dir = %self.snapshot_dir.display(),
            square_base_url = %self.square.base_url,
            window_days = self.bookings.window_days,
            lookahead_days = self.bookings.lookahead_days,
            sheet_tab_index = self.sheet.tab_index,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}
