//! Topic knowledge base with retrieval-augmented answering.
//!
//! Topics are stored in SQLite with their embeddings. A question is
//! embedded, matched against the store (falling back to full-text search
//! when nothing is close enough), and answered by the chat model from the
//! cited excerpts.

pub mod embeddings;
pub mod ingest;
pub mod rag;
pub mod search;
pub mod store;
pub mod types;

pub use embeddings::{EmbeddingClient, EmbeddingProvider, ModelHandle};
pub use ingest::{ingest_topics, load_topic_records, prepare_topics, PreparedTopic};
pub use rag::{Answer, AskError, AskErrorKind, CitedTopic, RetrievalPipeline};
pub use search::{SearchOutcome, SearchStrategy, SimilaritySearch};
pub use store::{TopicIndex, TopicStore};
pub use types::{IngestStats, NewTopic, RankedTopic, ScoredTopic, StoreStats, Topic, TopicRecord};

use std::path::Path;
use std::sync::Arc;
use topica_core::{AppConfig, AppResult};

/// Open the configured topic store, creating the schema on first use.
pub fn open_store(config: &AppConfig) -> AppResult<Arc<TopicStore>> {
    let path = config.database_path();
    tracing::debug!("Opening topic store at {:?}", path);
    Ok(Arc::new(TopicStore::open(&path, config.database.pool_size)?))
}

/// Replace the store contents with the topics in a JSON file.
pub async fn ingest_file(config: &AppConfig, path: &Path) -> AppResult<IngestStats> {
    let records = load_topic_records(path)?;
    let store = open_store(config)?;
    let embedder = EmbeddingClient::from_settings(&config.embedding);
    ingest_topics(&store, &embedder, &records).await
}

/// Counts and size of the configured store.
pub async fn stats(config: &AppConfig) -> AppResult<StoreStats> {
    open_store(config)?.stats().await
}

/// Build the question-answering pipeline over the configured store.
pub fn build_pipeline(config: &AppConfig) -> AppResult<RetrievalPipeline> {
    let store = open_store(config)?;
    RetrievalPipeline::from_config(config, store)
}
