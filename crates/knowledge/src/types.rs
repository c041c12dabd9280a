//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored document ("topic").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Identifier assigned by the store
    pub id: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Source URL, unique across the store
    pub url: String,
}

/// A topic ready to be written by an ingestion pass.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTopic {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub embedding: Option<Vec<f32>>,
}

/// A raw row returned by the store together with its score.
///
/// For nearest-neighbour queries `score` is the cosine distance (lower is
/// closer); for text queries it is the text relevance (higher is better).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTopic {
    pub topic: Topic,
    pub score: f32,
}

/// A topic placed in a result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTopic {
    /// 1-based position, contiguous across the list
    pub rank: usize,

    /// Normalised similarity in [0.0, 1.0]; 0.0 for text-search results
    pub similarity: f32,

    pub topic: Topic,
}

/// One entry of a topics file consumed by ingestion.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TopicRecord {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub subtitle: Option<String>,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}

/// Statistics from an ingestion pass.
#[derive(Debug, Clone, Serialize)]
pub struct IngestStats {
    /// Records read from the source
    pub read: usize,

    /// Records dropped (no URL, blank text or duplicate URL)
    pub skipped: usize,

    /// Topics written to the store
    pub inserted: usize,

    pub duration_secs: f64,
}

/// Statistics about the topic store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub topics: u64,

    /// Topics with a stored embedding
    pub embedded: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ingest_at: Option<DateTime<Utc>>,

    pub db_size_bytes: u64,
}
