//! Stats command handler.
//!
//! Shows what the topic store currently holds.

use super::print_json;
use clap::Args;
use topica_core::{config::AppConfig, AppResult};
use topica_knowledge::StoreStats;

/// Show topic store statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let stats = topica_knowledge::stats(config).await?;

        if self.json {
            print_json(&serde_json::json!({
                "database": config.database_path(),
                "topics": stats.topics,
                "embedded": stats.embedded,
                "lastIngestAt": stats.last_ingest_at.map(|t| t.to_rfc3339()),
                "dbSizeBytes": stats.db_size_bytes,
            }))
        } else {
            println!("{}", render_stats(&stats));
            Ok(())
        }
    }
}

fn render_stats(stats: &StoreStats) -> String {
    let last = stats
        .last_ingest_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());

    format!(
        "Topics: {}\nEmbedded: {}\nLast ingest: {}\nDatabase size: {} bytes",
        stats.topics, stats.embedded, last, stats.db_size_bytes
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_empty_store() {
        let stats = StoreStats {
            topics: 0,
            embedded: 0,
            last_ingest_at: None,
            db_size_bytes: 4096,
        };
        let text = render_stats(&stats);
        assert!(text.contains("Topics: 0"));
        assert!(text.contains("Last ingest: never"));
    }
}
