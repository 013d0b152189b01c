//! Core data types for the ingestion pipeline
//! Pure data structures with no behavior

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Column order of the staging CSV and of the target table insert.
pub const RATE_COLUMNS: [&str; 7] = [
    "base_code",
    "target_code",
    "rate",
    "time_last_update_utc",
    "time_next_update_utc",
    "time_next_update_unix",
    "time_last_update_unix",
];

/// Where the snapshot comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Local JSON fixture; `None` uses `paths.sample_file` from the config
    Sample(Option<PathBuf>),
    /// Provider API
    Live,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Sample(_) => write!(f, "sample"),
            Source::Live => write!(f, "live"),
        }
    }
}

/// Validated rate snapshot for one base currency
#[derive(Debug, Clone, PartialEq)]
pub struct RateDocument {
    pub base_code: String,
    pub time_last_update_utc: DateTime<FixedOffset>,
    pub time_next_update_utc: DateTime<FixedOffset>,
    pub time_last_update_unix: i64,
    pub time_next_update_unix: i64,
    /// Target code and rate, in document order
    pub conversion_rates: Vec<(String, Decimal)>,
}

/// One normalized (base, target, rate, timestamps) record.
///
/// Field order matches [`RATE_COLUMNS`]; the CSV writer relies on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub base_code: String,
    pub target_code: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub rate: Decimal,
    pub time_last_update_utc: DateTime<FixedOffset>,
    pub time_next_update_utc: DateTime<FixedOffset>,
    pub time_next_update_unix: i64,
    pub time_last_update_unix: i64,
}

/// Load operation statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_loaded: usize,
    /// As reported by the server; MySQL counts an updated duplicate as 2
    pub rows_affected: u64,
}

impl std::fmt::Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "loaded: {}, affected: {}",
            self.rows_loaded, self.rows_affected
        )
    }
}

/// Outcome of a full pipeline run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub rows_transformed: usize,
    pub csv_path: PathBuf,
    pub load: LoadReport,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "transformed: {}, file: {}, {}",
            self.rows_transformed,
            self.csv_path.display(),
            self.load
        )
    }
}
