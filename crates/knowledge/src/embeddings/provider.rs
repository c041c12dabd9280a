//! Embedding provider trait and factory.

use super::providers::{MockEmbeddingProvider, OllamaEmbeddingProvider};
use std::sync::Arc;
use std::time::Duration;
use topica_core::config::EmbeddingSettings;
use topica_core::{AppError, AppResult};

/// Trait for embedding providers.
///
/// Implementations return the raw vector; shape checks happen in
/// [`EmbeddingClient`](super::EmbeddingClient).
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Generate the embedding for a single text.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;

    /// Generate embeddings for several texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Create an embedding provider based on configuration.
pub fn create_provider(settings: &EmbeddingSettings) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.provider.as_str() {
        "ollama" => {
            let provider = OllamaEmbeddingProvider::new(
                &settings.endpoint,
                &settings.model,
                Duration::from_secs(settings.timeout_secs.max(1)),
            )?;
            Ok(Arc::new(provider))
        }

        "mock" => {
            let dimensions = settings
                .dimensions
                .unwrap_or(MockEmbeddingProvider::DEFAULT_DIMENSIONS);
            Ok(Arc::new(MockEmbeddingProvider::new(dimensions)))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, mock",
            settings.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> EmbeddingSettings {
        EmbeddingSettings {
            provider: provider.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_ollama_provider() {
        let provider = create_provider(&settings("ollama")).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
    }

    #[tokio::test]
    async fn test_create_mock_provider_uses_configured_dimensions() {
        let mut settings = settings("mock");
        settings.dimensions = Some(16);

        let provider = create_provider(&settings).unwrap();
        assert_eq!(provider.provider_name(), "mock");
        assert_eq!(provider.embed("test text").await.unwrap().len(), 16);
    }

    #[test]
    fn test_create_unknown_provider() {
        let result = create_provider(&settings("unknown"));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[tokio::test]
    async fn test_default_batch_keeps_order() {
        let provider = MockEmbeddingProvider::new(32);
        let texts = vec!["first text".to_string(), "second text".to_string()];

        let batch = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], provider.embed("first text").await.unwrap());
        assert_eq!(batch[1], provider.embed("second text").await.unwrap());
    }
}
