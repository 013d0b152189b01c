//! Data ingestion module - extract, transform, stage and load exchange rates

pub mod error;
pub mod fetch;
pub mod load;
pub mod parse;
pub mod retry;
pub mod types;
pub mod utils;
pub mod write;

pub use error::*;
pub use types::*;
