//! Utility functions for common operations

use crate::ingestion::error::ExtractError;
use chrono::NaiveDate;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

/// Download a response body via HTTP GET
pub async fn http_get(url: &str, timeout: Duration) -> Result<Vec<u8>, ExtractError> {
    let client = Client::builder().timeout(timeout).build()?;

    let response = client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(ExtractError::Status(status));
    }

    let bytes = response.bytes().await?;
    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Date-stamped staging file name, e.g. `rates_2025-06-23.csv`
pub fn rates_filename(date: NaiveDate) -> String {
    format!("rates_{}.csv", date.format("%Y-%m-%d"))
}

/// Unquoted MySQL identifier: 1-64 chars of `[A-Za-z0-9_$]`
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Replace every occurrence of `secret` in `text` with asterisks
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "*******")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_filename() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        assert_eq!(rates_filename(date), "rates_2025-06-03.csv");
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("exchange_rates"));
        assert!(is_valid_identifier("rates_2025"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("rates`; DROP"));
        assert!(!is_valid_identifier("schema.rates"));
        assert!(!is_valid_identifier(&"x".repeat(65)));
    }

    #[test]
    fn test_redact() {
        assert_eq!(
            redact("https://api.example.com/v6/abc123/latest/USD", "abc123"),
            "https://api.example.com/v6/*******/latest/USD"
        );
        assert_eq!(redact("no secret here", ""), "no secret here");
    }
}
