//! Answer and error types of the question answering pipeline.

use serde::Serialize;
use thiserror::Error;
use topica_core::AppError;

/// Reply given when retrieval finds nothing; the LLM is not consulted.
pub const NO_RESULTS_MESSAGE: &str = "I could not find any relevant document in the knowledge base. \
Could you rephrase your question or provide more context?";

/// A ranked topic as cited in an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitedTopic {
    /// Matches the `[DocN]` tag used in the context and the answer
    pub rank: usize,

    pub topic_id: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub url: String,

    pub excerpt: String,

    /// Similarity in [0, 1]; 0.0 when found by text search
    pub similarity: f32,
}

impl CitedTopic {
    /// The citation tag for this topic, e.g. `[Doc2]`.
    pub fn tag(&self) -> String {
        format!("[Doc{}]", self.rank)
    }
}

/// Final answer with the topics that grounded it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub documents: Vec<CitedTopic>,
}

impl Answer {
    /// The fixed reply for an empty retrieval.
    pub fn no_results() -> Self {
        Self {
            answer: NO_RESULTS_MESSAGE.to_string(),
            documents: Vec::new(),
        }
    }
}

/// Failure classes callers can map to user-facing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AskErrorKind {
    /// Bad input from the caller
    Validation,
    /// Embedding or store failure
    Retrieval,
    /// LLM failure after documents were found
    Synthesis,
}

impl AskErrorKind {
    /// HTTP status a transport layer would answer with.
    pub fn http_status(self) -> u16 {
        match self {
            AskErrorKind::Validation => 400,
            AskErrorKind::Retrieval | AskErrorKind::Synthesis => 502,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AskErrorKind::Validation => "validation",
            AskErrorKind::Retrieval => "retrieval",
            AskErrorKind::Synthesis => "synthesis",
        }
    }
}

/// Error returned by [`RetrievalPipeline::ask`](super::RetrievalPipeline::ask).
#[derive(Error, Debug)]
pub enum AskError {
    #[error("Invalid question: {0}")]
    Validation(String),

    #[error("Document retrieval failed: {0}")]
    Retrieval(AppError),

    #[error("Answer generation failed: {0}")]
    AnswerGeneration(AppError),
}

impl AskError {
    pub fn kind(&self) -> AskErrorKind {
        match self {
            AskError::Validation(_) => AskErrorKind::Validation,
            AskError::Retrieval(_) => AskErrorKind::Retrieval,
            AskError::AnswerGeneration(_) => AskErrorKind::Synthesis,
        }
    }

    /// Whether running the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AskError::Validation(_))
    }
}
