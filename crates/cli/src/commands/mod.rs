//! Command handlers for the Topica CLI.

pub mod ask;
pub mod ingest;
pub mod stats;

pub use ask::AskCommand;
pub use ingest::IngestCommand;
pub use stats::StatsCommand;

use topica_core::{AppError, AppResult};

/// Print a JSON document to stdout.
pub(crate) fn print_json(value: &serde_json::Value) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
