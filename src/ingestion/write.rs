//! Write functions - stage rate rows as a CSV file for the loader

use crate::ingestion::error::WriteError;
use crate::ingestion::types::{RateRow, RATE_COLUMNS};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Write rows to `output_dir/filename` and return the absolute path.
///
/// The header always comes from [`RATE_COLUMNS`], so an empty slice
/// produces a header-only file.
pub fn save_to_csv(
    rows: &[RateRow],
    output_dir: &Path,
    filename: &str,
) -> Result<PathBuf, WriteError> {
    fs::create_dir_all(output_dir)?;
    let file_path = output_dir.join(filename);

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&file_path)?;

    writer.write_record(RATE_COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let file_path = fs::canonicalize(&file_path)?;
    info!("Saved {} rows to {}", rows.len(), file_path.display());

    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::parse::parse_rate_timestamp;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tempfile::tempdir;

    fn mock_row(target_code: &str, rate: &str) -> RateRow {
        RateRow {
            base_code: "USD".to_string(),
            target_code: target_code.to_string(),
            rate: Decimal::from_str(rate).unwrap(),
            time_last_update_utc: parse_rate_timestamp("Wed, 23 Jun 2025 10:00:00 +0000")
                .unwrap(),
            time_next_update_utc: parse_rate_timestamp("Thu, 24 Jun 2025 10:00:00 +0000")
                .unwrap(),
            time_next_update_unix: 1750896000,
            time_last_update_unix: 1750809600,
        }
    }

    #[test]
    fn test_save_to_csv() {
        let temp = tempdir().unwrap();
        let out_dir = temp.path().join("processed").join("nested");
        let rows = vec![mock_row("EUR", "0.8454"), mock_row("GBP", "0.7312000000")];

        let path = save_to_csv(&rows, &out_dir, "rates_2025-06-23.csv").unwrap();

        assert!(path.is_absolute());
        assert!(path.exists());
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "base_code,target_code,rate,time_last_update_utc,time_next_update_utc,time_next_update_unix,time_last_update_unix"
        );
        assert!(lines[1].starts_with("USD,EUR,0.8454,2025-06-23T10:00:00"));
        assert!(lines[1].ends_with(",1750896000,1750809600"));
        assert!(lines[2].starts_with("USD,GBP,0.7312000000,"));
    }

    #[test]
    fn test_save_empty_rows_writes_header_only() {
        let temp = tempdir().unwrap();

        let path = save_to_csv(&[], temp.path(), "empty.csv").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.starts_with("base_code,target_code,rate"));
    }

    #[test]
    fn test_existing_directory_is_fine() {
        let temp = tempdir().unwrap();

        save_to_csv(&[mock_row("EUR", "1")], temp.path(), "a.csv").unwrap();
        let path = save_to_csv(&[mock_row("EUR", "2")], temp.path(), "a.csv").unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("USD,EUR,2,"));
    }
}
