//! Question answering orchestration.
//!
//! Sequences embedding, similarity search, context assembly and answer
//! synthesis, and decides what happens when a step fails or finds nothing.

use super::citations::strip_dangling_citations;
use super::context::ContextBuilder;
use super::synth::AnswerSynthesizer;
use super::types::{Answer, AskError};
use crate::embeddings::EmbeddingClient;
use crate::search::{clamp_top_k, SimilaritySearch};
use crate::store::TopicIndex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use topica_core::config::RetrieverSettings;
use topica_core::{AppConfig, AppError, AppResult};
use topica_prompt::{ask_prompt, build_prompt, load_prompt, PromptDefinition, ASK_PROMPT_ID};

/// Result count used when neither the caller nor the configuration sets one.
pub const DEFAULT_TOP_K: u32 = 5;

/// Steps of a single `ask` run, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Embedding,
    Retrieving,
    NoResults,
    ContextBuilt,
    Synthesizing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Embedding => "embedding",
            Stage::Retrieving => "retrieving",
            Stage::NoResults => "no_results",
            Stage::ContextBuilt => "context_built",
            Stage::Synthesizing => "synthesizing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Answers questions from the topic store.
#[derive(Debug)]
pub struct RetrievalPipeline {
    embedder: Arc<EmbeddingClient>,
    search: SimilaritySearch,
    context: ContextBuilder,
    synthesizer: AnswerSynthesizer,
    prompt: PromptDefinition,
    default_top_k: u32,
}

impl RetrievalPipeline {
    /// Pipeline with the built-in prompt and default limits.
    pub fn new(
        embedder: Arc<EmbeddingClient>,
        search: SimilaritySearch,
        synthesizer: AnswerSynthesizer,
    ) -> Self {
        Self {
            embedder,
            search,
            context: ContextBuilder::new(RetrieverSettings::default().context_char_limit),
            synthesizer,
            prompt: ask_prompt(),
            default_top_k: DEFAULT_TOP_K,
        }
    }

    /// Pipeline wired from configuration: the configured LLM and embedding
    /// provider, retriever settings, and the workspace prompt override if
    /// one exists.
    pub fn from_config(config: &AppConfig, index: Arc<dyn TopicIndex>) -> AppResult<Self> {
        let llm = topica_llm::create_client(&config.llm)?;
        let embedder = Arc::new(EmbeddingClient::from_settings(&config.embedding));
        let search = SimilaritySearch::from_settings(index, &config.retriever);
        let synthesizer = AnswerSynthesizer::from_settings(llm, &config.llm);
        let prompt = load_prompt(&config.workspace, ASK_PROMPT_ID)?;

        Ok(Self::new(embedder, search, synthesizer)
            .with_context_builder(ContextBuilder::new(config.retriever.context_char_limit))
            .with_prompt(prompt)
            .with_default_top_k(config.retriever.top_k))
    }

    pub fn with_context_builder(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    pub fn with_prompt(mut self, prompt: PromptDefinition) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_default_top_k(mut self, top_k: u32) -> Self {
        self.default_top_k = clamp_top_k(top_k);
        self
    }

    /// Answer `question` using up to `top_k` documents (clamped to 1..=10,
    /// defaulting to the configured value).
    ///
    /// A blank question fails before any external call. When nothing is
    /// retrieved the fixed no-results answer is returned without calling
    /// the LLM.
    #[tracing::instrument(skip(self, question), fields(question_len = question.len()))]
    pub async fn ask(&self, question: &str, top_k: Option<u32>) -> Result<Answer, AskError> {
        let result = self.run(question, top_k).await;

        if let Err(e) = &result {
            enter(Stage::Failed);
            tracing::warn!(kind = e.kind().as_str(), "Question answering failed: {}", e);
        }

        result
    }

    async fn run(&self, question: &str, top_k: Option<u32>) -> Result<Answer, AskError> {
        enter(Stage::Validating);
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::Validation(
                "question must not be blank".to_string(),
            ));
        }
        let top_k = clamp_top_k(top_k.unwrap_or(self.default_top_k));

        enter(Stage::Embedding);
        let vector = self
            .embedder
            .embed(question)
            .await
            .map_err(AskError::Retrieval)?;

        enter(Stage::Retrieving);
        let outcome = self
            .search
            .search(&vector, Some(question), top_k)
            .await
            .map_err(AskError::Retrieval)?;

        if outcome.topics.is_empty() {
            enter(Stage::NoResults);
            tracing::info!("No relevant topic found, skipping answer generation");
            return Ok(Answer::no_results());
        }

        let documents = self.context.cite(&outcome.topics);
        let context = self.context.build(&documents);
        enter(Stage::ContextBuilt);
        tracing::info!(
            "Retrieved {} topics via {:?} search (context: {} chars)",
            documents.len(),
            outcome.strategy,
            context.chars().count()
        );

        let mut variables = HashMap::new();
        variables.insert("question".to_string(), question.to_string());
        variables.insert("context".to_string(), context);
        let prompt =
            build_prompt(&self.prompt, &variables).map_err(AskError::AnswerGeneration)?;

        enter(Stage::Synthesizing);
        let raw = self
            .synthesizer
            .synthesize(&prompt.system, &prompt.user)
            .await
            .map_err(AskError::AnswerGeneration)?;

        let (cleaned, removed) = strip_dangling_citations(&raw, documents.len());
        if !removed.is_empty() {
            tracing::warn!(
                "Removed citations to unknown documents: {}",
                removed.join(", ")
            );
        }

        let answer = cleaned.trim().to_string();
        if answer.is_empty() {
            return Err(AskError::AnswerGeneration(AppError::Llm(
                "LLM response contained no usable text".to_string(),
            )));
        }

        enter(Stage::Done);
        Ok(Answer { answer, documents })
    }
}

fn enter(stage: Stage) {
    tracing::debug!(stage = %stage, "Pipeline stage");
}
