//! Error types for each pipeline stage.

use crate::config::ConfigError;
use std::path::PathBuf;

/// Errors produced while validating and flattening a rate document.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// A required key is absent from the document.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A key is present but holds the wrong kind of value.
    #[error("field `{field}` must be {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    /// A UTC timestamp string does not match `%a, %d %b %Y %H:%M:%S %z`.
    #[error("malformed timestamp in `{field}`: {value:?}")]
    MalformedTimestamp { field: &'static str, value: String },
}

/// Errors produced while writing the staging CSV.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors produced while loading the staging CSV into the database.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("invalid source file {}: {reason}", .path.display())]
    InvalidSource { path: PathBuf, reason: String },

    #[error("invalid table name {0:?}")]
    InvalidTable(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Connection could not be established within the retry budget.
    #[error("database connection failed after {attempts} attempt(s): {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    /// A statement failed after connecting; the transaction was rolled back.
    #[error("load into `{table}` failed{}: {source}", .row.map(|r| format!(" at row {r}")).unwrap_or_default())]
    Execution {
        table: String,
        row: Option<usize>,
        #[source]
        source: sqlx::Error,
    },
}

/// Errors produced while retrieving the raw snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate provider returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractError {
    /// Whether a fresh request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ExtractError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ExtractError::Status(status) => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            ExtractError::Io { .. } | ExtractError::Json(_) => false,
        }
    }
}

/// A failed pipeline run, tagged with the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("config stage: {0}")]
    Config(#[from] ConfigError),

    #[error("extract stage: {0}")]
    Extract(#[from] ExtractError),

    #[error("transform stage: {0}")]
    Transform(#[from] TransformError),

    #[error("write stage: {0}")]
    Write(#[from] WriteError),

    #[error("load stage: {0}")]
    Load(#[from] LoadError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_the_key() {
        let err = TransformError::MissingField("base_code");
        assert_eq!(err.to_string(), "missing required field `base_code`");
    }

    #[test]
    fn execution_error_mentions_row_when_known() {
        let err = LoadError::Execution {
            table: "exchange_rates".to_string(),
            row: Some(50),
            source: sqlx::Error::Protocol("duplicate".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("`exchange_rates`"), "got: {msg}");
        assert!(msg.contains("at row 50"), "got: {msg}");

        let err = LoadError::Execution {
            table: "exchange_rates".to_string(),
            row: None,
            source: sqlx::Error::Protocol("commit".into()),
        };
        assert!(!err.to_string().contains("at row"));
    }

    #[test]
    fn status_errors_classified() {
        assert!(ExtractError::Status(reqwest::StatusCode::BAD_GATEWAY).is_transient());
        assert!(ExtractError::Status(reqwest::StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(!ExtractError::Status(reqwest::StatusCode::FORBIDDEN).is_transient());
    }

    #[test]
    fn pipeline_error_prefixes_stage() {
        let err: PipelineError = TransformError::MissingField("base_code").into();
        assert!(err.to_string().starts_with("transform stage:"));
    }
}
