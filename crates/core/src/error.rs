//! Error types for Topica.
//!
//! This module defines a unified error enum that covers all infrastructure
//! error categories: configuration, I/O, LLM, embeddings, the document store,
//! prompts and serialization.

use thiserror::Error;

/// Unified error type for Topica.
///
/// Every fallible operation returns `Result<T, AppError>`. Failures of
/// external collaborators always surface as one of these variants; nothing
/// is silently downgraded.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (unreachable, bad status, empty answer)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding provider errors (unreachable, malformed, non-finite, dimension mismatch)
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Document store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Knowledge base errors (ingestion input, bookkeeping)
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category() {
        let err = AppError::Embedding("dimension 3 does not match expected 4".to_string());
        assert_eq!(
            err.to_string(),
            "Embedding error: dimension 3 does not match expected 4"
        );
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AppError = parse_err.into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
