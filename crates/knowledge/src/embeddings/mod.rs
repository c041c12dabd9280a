//! Embedding generation with numeric and shape validation.
//!
//! [`EmbeddingClient`] wraps the shared [`ModelHandle`] and guarantees that
//! every vector it hands out is non-empty, finite and of one fixed length.
//! The length is either configured up front or fixed by the first vector
//! produced during the client's lifetime.

pub mod handle;
pub mod provider;
pub mod providers;

pub use handle::ModelHandle;
pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{MockEmbeddingProvider, OllamaEmbeddingProvider};

use std::sync::{Arc, OnceLock};
use topica_core::config::EmbeddingSettings;
use topica_core::{AppError, AppResult};

/// Validating front of the embedding provider.
#[derive(Debug)]
pub struct EmbeddingClient {
    handle: Arc<ModelHandle>,
    expected_dim: OnceLock<usize>,
}

impl EmbeddingClient {
    /// Create a client. A positive `dimensions` is authoritative from the
    /// first call; `None` (or zero) fixes it lazily.
    pub fn new(handle: Arc<ModelHandle>, dimensions: Option<usize>) -> Self {
        let expected_dim = OnceLock::new();
        if let Some(dim) = dimensions.filter(|d| *d > 0) {
            let _ = expected_dim.set(dim);
        }

        Self {
            handle,
            expected_dim,
        }
    }

    /// Client for the configured provider, loaded on first use.
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self::new(
            Arc::new(ModelHandle::from_settings(settings.clone())),
            settings.dimensions,
        )
    }

    /// The dimension every vector must have, once known.
    pub fn expected_dimensions(&self) -> Option<usize> {
        self.expected_dim.get().copied()
    }

    /// Embed one non-blank text.
    ///
    /// # Errors
    /// `AppError::Embedding` for blank input, provider failures, empty,
    /// all-zero or non-finite vectors, and vectors whose length differs from the
    /// expected dimension. Vectors are never padded or truncated.
    #[tracing::instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(AppError::Embedding("Cannot embed empty text".to_string()));
        }

        let provider = self.handle.get().await?;
        let vector = provider.embed(text).await?;
        self.validate(vector)
    }

    /// Embed several texts, validating each vector as [`embed`](Self::embed) does.
    pub async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(i) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(AppError::Embedding(format!(
                "Cannot embed empty text at index {}",
                i
            )));
        }

        let provider = self.handle.get().await?;
        tracing::info!(
            "Embedding {} texts with {} ({})",
            texts.len(),
            provider.provider_name(),
            provider.model_name()
        );

        let vectors = provider.embed_batch(texts).await?;
        if vectors.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        vectors.into_iter().map(|v| self.validate(v)).collect()
    }

    fn validate(&self, vector: Vec<f32>) -> AppResult<Vec<f32>> {
        if vector.is_empty() {
            return Err(AppError::Embedding(
                "Embedding service returned an empty vector".to_string(),
            ));
        }

        if let Some(i) = vector.iter().position(|v| !v.is_finite()) {
            return Err(AppError::Embedding(format!(
                "Embedding component {} is not a finite number",
                i
            )));
        }

        if vector.iter().all(|v| *v == 0.0) {
            return Err(AppError::Embedding(
                "Embedding service returned an all-zero vector".to_string(),
            ));
        }

        if self.expected_dim.set(vector.len()).is_ok() {
            tracing::info!("Embedding dimension fixed at {}", vector.len());
        }

        let expected = self.expected_dim.get().copied().unwrap_or(vector.len());
        if vector.len() != expected {
            return Err(AppError::Embedding(format!(
                "Embedding has {} dimensions, expected {}",
                vector.len(),
                expected
            )));
        }

        Ok(vector)
    }
}
