//! LLM provider factory.
//!
//! Builds the chat client described by the `llm` section of the configuration.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use std::sync::Arc;
use std::time::Duration;
use topica_core::config::LlmSettings;
use topica_core::{AppError, AppResult};

/// Create the chat client for the configured endpoint.
///
/// Only Ollama-compatible endpoints are supported. The timeout bounds the
/// connection and each wait for the next streamed fragment, not the whole
/// answer.
///
/// # Errors
/// Returns `AppError::Config` for an empty endpoint and `AppError::Llm` if
/// the HTTP client cannot be built.
pub fn create_client(settings: &LlmSettings) -> AppResult<Arc<dyn LlmClient>> {
    if settings.endpoint.trim().is_empty() {
        return Err(AppError::Config("LLM endpoint must not be empty".to_string()));
    }

    let client = OllamaClient::with_timeout(
        settings.endpoint.trim(),
        Duration::from_secs(settings.timeout_secs.max(1)),
    )?;

    tracing::debug!(
        "Created LLM client for {} (model: {}, timeout: {}s)",
        settings.endpoint,
        settings.model,
        settings.timeout_secs
    );

    Ok(Arc::new(client))
}
