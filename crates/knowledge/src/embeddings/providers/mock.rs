//! Offline embedding provider built from character trigrams.

use crate::embeddings::provider::EmbeddingProvider;
use std::collections::{HashMap, HashSet};
use topica_core::AppResult;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Deterministic provider for tests and offline use.
///
/// Words are hashed (whole and by trigram) into a fixed number of buckets
/// and the result is normalised to a unit vector, so texts sharing words
/// land close to each other. Not a semantic model.
#[derive(Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Create a mock provider; a zero dimension falls back to the default.
    pub fn new(dimensions: usize) -> Self {
        let dimensions = if dimensions == 0 {
            Self::DEFAULT_DIMENSIONS
        } else {
            dimensions
        };
        Self { dimensions }
    }

    fn hashed_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];
        let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();

        let lower = text.to_lowercase();
        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !stop_words.contains(w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let bucket = hash(&trigram, 37) % self.dimensions;
                embedding[bucket] += (*freq as f32).sqrt();
            }

            let bucket = hash(word, 31) % self.dimensions;
            embedding[bucket] += *freq as f32;
        }

        // Nothing survived filtering: hash the whole text instead
        let whole = lower.trim();
        if word_freq.is_empty() && !whole.is_empty() {
            let bucket = hash(whole, 31) % self.dimensions;
            embedding[bucket] += 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

fn hash(value: &str, multiplier: u64) -> usize {
    value
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(b as u64)) as usize
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(self.hashed_embedding(text))
    }
}
