//! Exchange rates ETL entry point - one snapshot per invocation

use anyhow::Result;
use clap::Parser;
use exchange_rates_etl::ingestion::retry::RetryPolicy;
use exchange_rates_etl::ingestion::Source;
use exchange_rates_etl::logging;
use exchange_rates_etl::pipeline::{run_pipeline, RunOptions};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "rates-etl",
    version,
    about = "Fetch an exchange rate snapshot, stage it as CSV and upsert it into MySQL"
)]
struct Cli {
    /// Fetch from the rate provider instead of the sample fixture
    #[arg(long)]
    live: bool,

    /// Sample JSON to use instead of `paths.sample_file`
    #[arg(long, conflicts_with = "live")]
    sample: Option<PathBuf>,

    /// Path to the YAML application config
    #[arg(long, default_value = "configs/default.yaml")]
    config: PathBuf,

    /// Explicit .env file (default: ./.env if present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Directory for the staged CSV (default: `paths.output_dir`)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Attempts for database connection and provider fetch
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Seconds to wait between attempts
    #[arg(long, default_value_t = 5)]
    retry_delay_secs: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log file written alongside stdout
    #[arg(long, default_value = "logs/main.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level, Some(&cli.log_file))?;

    let source = if cli.live {
        Source::Live
    } else {
        Source::Sample(cli.sample)
    };

    let options = RunOptions {
        config_path: cli.config,
        env_file: cli.env_file,
        source,
        output_dir: cli.output_dir,
        retry: RetryPolicy::new(cli.retries, Duration::from_secs(cli.retry_delay_secs)),
    };

    run_pipeline(&options).await?;

    Ok(())
}
