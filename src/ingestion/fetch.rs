//! Fetch functions - retrieve the raw rate snapshot

use crate::ingestion::error::ExtractError;
use crate::ingestion::retry::RetryPolicy;
use crate::ingestion::utils::http_get;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Fetch the latest snapshot from the rate provider.
///
/// Timeouts, connect failures, 5xx and 429 responses are retried per `retry`.
pub async fn fetch_exchange_rates(
    url: &str,
    timeout: Duration,
    retry: &RetryPolicy,
) -> Result<Value, ExtractError> {
    info!("Fetching exchange rates from provider");

    let body = retry
        .run(
            "rate provider fetch",
            move || http_get(url, timeout),
            ExtractError::is_transient,
        )
        .await
        .map_err(|failure| failure.error)?;

    let raw: Value = serde_json::from_slice(&body)?;
    info!("Successfully fetched exchange rates");

    Ok(raw)
}

/// Read a snapshot from a local JSON fixture
pub fn load_sample(path: &Path) -> Result<Value, ExtractError> {
    info!("Using sample JSON at {}", path.display());

    let text = fs::read_to_string(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(serde_json::from_str(&text)?)
}
