//! Ollama embedding provider.
//!
//! Calls the `/api/embeddings` endpoint of a local Ollama runtime, one text
//! per request. Failures surface immediately; there is no retry loop.
//!
//! # Example
//! ```no_run
//! use std::time::Duration;
//! use topica_knowledge::embeddings::{EmbeddingProvider, OllamaEmbeddingProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OllamaEmbeddingProvider::new(
//!     "http://localhost:11434",
//!     "nomic-embed-text",
//!     Duration::from_secs(60),
//! )?;
//! let embedding = provider.embed("Hello world").await?;
//! println!("{} dimensions", embedding.len());
//! # Ok(())
//! # }
//! ```

use crate::embeddings::provider::EmbeddingProvider;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use topica_core::{AppError, AppResult};
use tracing::{debug, instrument};

const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Ollama embedding provider using the local HTTP API.
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingProvider {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Values are decoded as `f64` so out-of-range numbers are caught when
/// narrowing instead of failing the whole decode.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for `model` served at `base_url`.
    ///
    /// # Errors
    /// Returns `AppError::Embedding` if the HTTP client cannot be built.
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::Embedding(format!("Failed to create HTTP client for Ollama: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model))]
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(AppError::Embedding("Cannot embed empty text".to_string()));
        }

        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);
        debug!("Sending embedding request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| {
                AppError::Embedding(format!("Unable to contact embedding service: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            let detail = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|body| body.error)
                .unwrap_or(error_text);

            return Err(AppError::Embedding(format!(
                "Embedding request failed with status {}: {}",
                status, detail
            )));
        }

        let body = response.text().await.map_err(|e| {
            AppError::Embedding(format!("Failed to read embedding response: {}", e))
        })?;

        decode_embedding(&body)
    }
}

/// Strictly decode an embeddings response body.
fn decode_embedding(body: &str) -> AppResult<Vec<f32>> {
    let parsed: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        AppError::Embedding(format!("Invalid response from embedding service: {}", e))
    })?;

    parsed
        .embedding
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let narrowed = value as f32;
            if narrowed.is_finite() {
                Ok(narrowed)
            } else {
                Err(AppError::Embedding(format!(
                    "Embedding component {} is not a finite number",
                    i
                )))
            }
        })
        .collect()
}
