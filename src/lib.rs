//! Exchange rates ETL: extract a rate snapshot, flatten it, stage it as CSV
//! and upsert it into MySQL.

pub mod config;
pub mod ingestion;
pub mod logging;
pub mod pipeline;
