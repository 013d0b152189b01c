//! Pipeline orchestrator - sequences config, extract, transform, write and load

use crate::config::{self, DatabaseConfig};
use crate::ingestion::load::{load_csv_to_table, Connector, MySqlConnector};
use crate::ingestion::retry::RetryPolicy;
use crate::ingestion::utils::{rates_filename, redact};
use crate::ingestion::{fetch, parse, write, PipelineError, RunSummary, Source};
use chrono::Local;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

const BANNER: &str = "============================================================";

/// Inputs for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: PathBuf,
    pub env_file: Option<PathBuf>,
    pub source: Source,
    /// Overrides `paths.output_dir` from the config
    pub output_dir: Option<PathBuf>,
    pub retry: RetryPolicy,
}

/// Run the whole pipeline once against MySQL.
///
/// Any stage failure ends the run; nothing is retried at this level.
pub async fn run_pipeline(options: &RunOptions) -> Result<RunSummary, PipelineError> {
    info!("{}", BANNER);
    info!("Starting Exchange Rates ETL Pipeline");
    info!("{}", BANNER);
    info!("******* Running in {} data mode *******", options.source);

    match execute(options).await {
        Ok(summary) => {
            info!("{}", BANNER);
            info!("Exchange Rates ETL Pipeline completed successfully!");
            info!("{}", summary);
            info!("{}", BANNER);
            Ok(summary)
        }
        Err(e) => {
            error!("{}", BANNER);
            error!("PIPELINE FAILED!");
            error!("Error: {}", e);
            error!("{}", BANNER);
            Err(e)
        }
    }
}

async fn execute(options: &RunOptions) -> Result<RunSummary, PipelineError> {
    info!("Step 1: Loading configuration and environment variables");
    config::load_environment(options.env_file.as_deref())?;
    let cfg = config::load_configuration(&options.config_path)?;
    let db_cfg = DatabaseConfig::from_env()?;
    info!("Configuration loaded successfully");

    info!("Step 2: Extracting exchange rate data");
    let raw = match &options.source {
        Source::Sample(path) => {
            let path = path.as_ref().unwrap_or(&cfg.paths.sample_file);
            fetch::load_sample(path)?
        }
        Source::Live => {
            let api_key = config::api_key_from_env()?;
            let url = config::construct_api_url(&cfg, &api_key)?;
            info!("Constructed API URL: {}", redact(&url, &api_key));
            fetch::fetch_exchange_rates(
                &url,
                Duration::from_secs(cfg.api.timeout_secs),
                &options.retry,
            )
            .await?
        }
    };
    info!("Data extraction completed successfully");

    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| cfg.paths.output_dir.clone());
    let filename = rates_filename(Local::now().date_naive());
    let connector = MySqlConnector::new(&db_cfg);

    run_stages(
        &raw,
        &output_dir,
        &filename,
        &db_cfg.table,
        &connector,
        &options.retry,
    )
    .await
}

/// Transform, write and load an already extracted snapshot
pub async fn run_stages<C: Connector>(
    raw: &Value,
    output_dir: &Path,
    filename: &str,
    table: &str,
    connector: &C,
    retry: &RetryPolicy,
) -> Result<RunSummary, PipelineError> {
    info!("Step 3: Transforming exchange rate data");
    let rows = parse::transform_rates(raw)?;
    info!("Data transformation completed successfully");

    info!("Step 4: Saving data to CSV file");
    let csv_path = write::save_to_csv(&rows, output_dir, filename)?;
    info!("CSV file saved successfully");

    info!("Step 5: Loading data into database");
    let load = load_csv_to_table(&csv_path, table, connector, retry).await?;
    info!("Database loading completed successfully");

    Ok(RunSummary {
        rows_transformed: rows.len(),
        csv_path,
        load,
    })
}
