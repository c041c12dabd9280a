//! Similarity search with a lexical fallback.
//!
//! The search runs one of two named strategies. [`SearchStrategy::Vector`]
//! always runs first; [`SearchStrategy::Text`] runs only when the vector
//! pass produced zero rows and a query text is available.

use crate::store::TopicIndex;
use crate::types::{RankedTopic, ScoredTopic};
use serde::Serialize;
use std::sync::Arc;
use topica_core::config::RetrieverSettings;
use topica_core::AppResult;

/// Smallest accepted result count.
pub const MIN_TOP_K: u32 = 1;

/// Largest accepted result count.
pub const MAX_TOP_K: u32 = 10;

/// Clamp a requested result count into `[MIN_TOP_K, MAX_TOP_K]`.
pub fn clamp_top_k(top_k: u32) -> u32 {
    top_k.clamp(MIN_TOP_K, MAX_TOP_K)
}

/// Map a distance to a similarity in `[0, 1]` with `1 / (1 + d)`.
///
/// `d = 0` gives 1.0 and larger distances approach 0.0. Out-of-range
/// results (negative distances, NaN) are clamped.
pub fn distance_to_similarity(distance: f32) -> f32 {
    let similarity = 1.0 / (1.0 + distance);
    if similarity.is_nan() {
        return 0.0;
    }
    similarity.clamp(0.0, 1.0)
}

/// How a result list was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Nearest neighbours by embedding distance
    Vector,
    /// Full-text match on title, subtitle and content
    Text,
}

/// Ranked topics and the strategy that found them.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub strategy: SearchStrategy,
    pub topics: Vec<RankedTopic>,
}

/// Similarity search over a [`TopicIndex`].
#[derive(Clone)]
pub struct SimilaritySearch {
    index: Arc<dyn TopicIndex>,
    text_fallback: bool,
    min_similarity: Option<f32>,
}

impl SimilaritySearch {
    /// Search with the text fallback enabled and no similarity floor.
    pub fn new(index: Arc<dyn TopicIndex>) -> Self {
        Self {
            index,
            text_fallback: true,
            min_similarity: None,
        }
    }

    pub fn from_settings(index: Arc<dyn TopicIndex>, settings: &RetrieverSettings) -> Self {
        Self::new(index)
            .with_text_fallback(settings.text_fallback)
            .with_min_similarity(settings.min_similarity)
    }

    pub fn with_text_fallback(mut self, enabled: bool) -> Self {
        self.text_fallback = enabled;
        self
    }

    /// Drop vector hits whose similarity is below `floor`.
    ///
    /// Hits are dropped before deciding whether the text fallback runs.
    pub fn with_min_similarity(mut self, floor: Option<f32>) -> Self {
        self.min_similarity = floor;
        self
    }

    /// The strategy to run after a vector pass that kept `vector_rows` rows.
    pub fn next_strategy(&self, vector_rows: usize, query_text: Option<&str>) -> Option<SearchStrategy> {
        let has_text = query_text.is_some_and(|text| !text.trim().is_empty());
        if vector_rows == 0 && self.text_fallback && has_text {
            Some(SearchStrategy::Text)
        } else {
            None
        }
    }

    /// Return up to `top_k` topics for `vector`, ranked from 1.
    ///
    /// `top_k` is clamped into `[1, 10]`. `query_text` feeds the text
    /// fallback; pass `None` to disable it for this call.
    ///
    /// # Errors
    /// Any store failure is returned unchanged.
    #[tracing::instrument(skip(self, vector, query_text), fields(dims = vector.len()))]
    pub async fn search(
        &self,
        vector: &[f32],
        query_text: Option<&str>,
        top_k: u32,
    ) -> AppResult<SearchOutcome> {
        let limit = clamp_top_k(top_k) as usize;

        let hits = self.index.nearest(vector, limit).await?;
        let fetched = hits.len();
        let topics = self.rank_vector_hits(hits);
        tracing::debug!(
            "Vector search kept {} of {} topics",
            topics.len(),
            fetched
        );

        match (self.next_strategy(topics.len(), query_text), query_text) {
            (Some(SearchStrategy::Text), Some(text)) => {
                tracing::info!("No vector match, falling back to text search");
                let hits = self.index.text_search(text, limit).await?;
                Ok(SearchOutcome {
                    strategy: SearchStrategy::Text,
                    topics: rank_text_hits(hits),
                })
            }
            _ => Ok(SearchOutcome {
                strategy: SearchStrategy::Vector,
                topics,
            }),
        }
    }

    fn rank_vector_hits(&self, hits: Vec<ScoredTopic>) -> Vec<RankedTopic> {
        hits.into_iter()
            .map(|hit| (distance_to_similarity(hit.score), hit.topic))
            .filter(|(similarity, _)| self.min_similarity.map_or(true, |floor| *similarity >= floor))
            .enumerate()
            .map(|(i, (similarity, topic))| RankedTopic {
                rank: i + 1,
                similarity,
                topic,
            })
            .collect()
    }
}

fn rank_text_hits(hits: Vec<ScoredTopic>) -> Vec<RankedTopic> {
    hits.into_iter()
        .enumerate()
        .map(|(i, hit)| RankedTopic {
            rank: i + 1,
            similarity: 0.0,
            topic: hit.topic,
        })
        .collect()
}

impl std::fmt::Debug for SimilaritySearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilaritySearch")
            .field("text_fallback", &self.text_fallback)
            .field("min_similarity", &self.min_similarity)
            .finish()
    }
}
