//! Ingest command handler.

use super::print_json;
use clap::Args;
use std::path::PathBuf;
use topica_core::{config::AppConfig, AppResult};

/// Replace the topic store with the topics of a JSON file
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// JSON array of {title, subtitle, content, url} objects
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {:?}", self.file);

        let stats = topica_knowledge::ingest_file(config, &self.file).await?;

        if self.json {
            print_json(&serde_json::json!({
                "read": stats.read,
                "skipped": stats.skipped,
                "inserted": stats.inserted,
                "durationSecs": stats.duration_secs,
            }))
        } else {
            println!(
                "Ingested {} topics ({} read, {} skipped) in {:.2}s",
                stats.inserted, stats.read, stats.skipped, stats.duration_secs
            );
            Ok(())
        }
    }
}
