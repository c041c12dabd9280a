//! Bulk ingestion of topics.
//!
//! A topics file is a JSON array of `{title, subtitle, content, url}`
//! objects. Every ingestion replaces the whole store.

use crate::embeddings::EmbeddingClient;
use crate::store::TopicStore;
use crate::types::{IngestStats, NewTopic, TopicRecord};
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;
use topica_core::{AppError, AppResult};

/// A record that passed filtering, with the text to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTopic {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub embedding_text: String,
}

/// Read a JSON array of topic records.
pub fn load_topic_records(path: &Path) -> AppResult<Vec<TopicRecord>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Knowledge(format!("Failed to read topics file {:?}: {}", path, e))
    })?;

    serde_json::from_str(&contents).map_err(|e| {
        AppError::Knowledge(format!("Failed to parse topics file {:?}: {}", path, e))
    })
}

/// Drop unusable records and build the embedding text of the rest.
///
/// A record is skipped when its URL is missing or blank, when title,
/// subtitle and content are all blank, or when an earlier record already
/// used the same URL.
pub fn prepare_topics(records: &[TopicRecord]) -> Vec<PreparedTopic> {
    let mut seen = HashSet::new();
    let mut prepared = Vec::with_capacity(records.len());

    for record in records {
        let Some(url) = non_blank(record.url.as_deref()) else {
            tracing::debug!("Skipping topic without URL");
            continue;
        };

        let parts: Vec<&str> = [&record.title, &record.subtitle, &record.content]
            .into_iter()
            .filter_map(|part| non_blank(part.as_deref()))
            .collect();
        if parts.is_empty() {
            tracing::debug!("Skipping topic {} with no text", url);
            continue;
        }

        if !seen.insert(url.to_string()) {
            tracing::warn!("Skipping duplicate topic URL: {}", url);
            continue;
        }

        prepared.push(PreparedTopic {
            title: record.title.clone(),
            subtitle: record.subtitle.clone(),
            content: record.content.clone(),
            url: url.to_string(),
            embedding_text: parts.join("\n\n"),
        });
    }

    prepared
}

/// Embed `records` and replace the store contents with them.
///
/// Nothing is written unless every embedding succeeds.
pub async fn ingest_topics(
    store: &TopicStore,
    embedder: &EmbeddingClient,
    records: &[TopicRecord],
) -> AppResult<IngestStats> {
    let start = Instant::now();
    tracing::info!("Starting ingestion of {} records", records.len());

    let prepared = prepare_topics(records);
    let texts: Vec<String> = prepared.iter().map(|t| t.embedding_text.clone()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;

    let rows: Vec<NewTopic> = prepared
        .into_iter()
        .zip(embeddings)
        .map(|(topic, embedding)| NewTopic {
            title: topic.title,
            subtitle: topic.subtitle,
            content: topic.content,
            url: topic.url,
            embedding: Some(embedding),
        })
        .collect();

    let inserted = store.replace_all(rows).await?;
    let duration = start.elapsed();

    tracing::info!(
        "Ingestion completed: {} read, {} inserted in {:.2}s",
        records.len(),
        inserted,
        duration.as_secs_f64()
    );

    Ok(IngestStats {
        read: records.len(),
        skipped: records.len() - inserted,
        inserted,
        duration_secs: duration.as_secs_f64(),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{MockEmbeddingProvider, ModelHandle};
    use crate::store::TopicIndex;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(title: Option<&str>, content: Option<&str>, url: Option<&str>) -> TopicRecord {
        TopicRecord {
            title: title.map(str::to_string),
            subtitle: None,
            content: content.map(str::to_string),
            url: url.map(str::to_string),
        }
    }

    fn mock_embedder() -> EmbeddingClient {
        EmbeddingClient::new(
            Arc::new(ModelHandle::ready(Arc::new(MockEmbeddingProvider::new(64)))),
            None,
        )
    }

    #[test]
    fn test_prepare_skips_unusable_records() {
        let records = vec![
            record(Some("No URL"), Some("text"), None),
            record(Some("Blank URL"), Some("text"), Some("   ")),
            record(Some("  "), Some(""), Some("https://kb/empty")),
            record(Some("Leave"), Some("Sixteen weeks."), Some("https://kb/leave")),
            record(Some("Leave again"), Some("Dup."), Some("https://kb/leave")),
        ];

        let prepared = prepare_topics(&records);
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].url, "https://kb/leave");
        assert_eq!(prepared[0].title.as_deref(), Some("Leave"));
    }

    #[test]
    fn test_embedding_text_joins_trimmed_parts() {
        let records = vec![TopicRecord {
            title: Some(" Badge ".to_string()),
            subtitle: Some("".to_string()),
            content: Some("Ask reception.\n".to_string()),
            url: Some(" https://kb/badge ".to_string()),
        }];

        let prepared = prepare_topics(&records);
        assert_eq!(prepared[0].embedding_text, "Badge\n\nAsk reception.");
        assert_eq!(prepared[0].url, "https://kb/badge");
    }

    #[test]
    fn test_load_topic_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("topics.json");
        std::fs::write(
            &path,
            r#"[{"title": "A", "url": "https://kb/a"}, {"content": "orphan"}]"#,
        )
        .unwrap();

        let records = load_topic_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].url.is_none());

        std::fs::write(&path, "{not an array").unwrap();
        assert!(load_topic_records(&path).is_err());
    }

    #[tokio::test]
    async fn test_ingest_replaces_store() {
        let dir = TempDir::new().unwrap();
        let store = TopicStore::open(&dir.path().join("topics.sqlite"), 2).unwrap();
        let embedder = mock_embedder();

        let first = vec![record(Some("Old"), Some("Old topic"), Some("https://kb/old"))];
        ingest_topics(&store, &embedder, &first).await.unwrap();

        let second = vec![
            record(Some("Parental leave"), Some("Sixteen weeks of paid leave."), Some("https://kb/leave")),
            record(Some("Office badge"), Some("Request a badge at reception."), Some("https://kb/badge")),
            record(None, None, Some("https://kb/empty")),
        ];
        let stats = ingest_topics(&store, &embedder, &second).await.unwrap();

        assert_eq!(stats.read, 3);
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.skipped, 1);

        let store_stats = store.stats().await.unwrap();
        assert_eq!(store_stats.topics, 2);
        assert_eq!(store_stats.embedded, 2);

        let query = embedder.embed("paid parental leave").await.unwrap();
        let hits = store.nearest(&query, 2).await.unwrap();
        assert_eq!(hits[0].topic.url, "https://kb/leave");
        assert_eq!(hits[0].topic.id, 1);
        assert!(store.text_search("old", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_embedding_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let store = TopicStore::open(&dir.path().join("topics.sqlite"), 2).unwrap();

        let embedder = mock_embedder();
        let first = vec![record(Some("Keep"), Some("Keep me"), Some("https://kb/keep"))];
        ingest_topics(&store, &embedder, &first).await.unwrap();

        // Configured for a different dimension than the mock produces
        let mismatched = EmbeddingClient::new(
            Arc::new(ModelHandle::ready(Arc::new(MockEmbeddingProvider::new(64)))),
            Some(32),
        );
        let second = vec![record(Some("New"), Some("New topic"), Some("https://kb/new"))];
        assert!(ingest_topics(&store, &mismatched, &second).await.is_err());

        assert_eq!(store.stats().await.unwrap().topics, 1);
        assert_eq!(store.text_search("keep", 5).await.unwrap().len(), 1);
    }
}
