//! Answer synthesis from a streamed chat completion.

use futures::StreamExt;
use std::sync::Arc;
use topica_core::config::LlmSettings;
use topica_core::{AppError, AppResult};
use topica_llm::{ChatMessage, ChatRequest, LlmClient};

/// Sends a system + user prompt to the LLM and reassembles the streamed reply.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: Option<f32>,
}

impl AnswerSynthesizer {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: None,
        }
    }

    pub fn from_settings(client: Arc<dyn LlmClient>, settings: &LlmSettings) -> Self {
        Self {
            client,
            model: settings.model.clone(),
            temperature: settings.temperature,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Stream a completion and return the trimmed, concatenated text.
    ///
    /// Fragments are appended in arrival order until one is marked done or
    /// the stream ends.
    ///
    /// # Errors
    /// `AppError::Llm` if the provider cannot be reached, answers with an
    /// error status, fails mid-stream, or produces only whitespace.
    #[tracing::instrument(skip(self, system, user), fields(model = %self.model, provider = self.client.provider_name()))]
    pub async fn synthesize(&self, system: &str, user: &str) -> AppResult<String> {
        let mut request = ChatRequest::new(
            self.model.clone(),
            vec![ChatMessage::system(system), ChatMessage::user(user)],
        );
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        let mut stream = self.client.stream(&request).await?;
        let mut answer = String::new();
        let mut fragments = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            fragments += 1;
            answer.push_str(&chunk.content);

            if chunk.done {
                if let Some(usage) = &chunk.usage {
                    tracing::debug!(
                        "Completion used {} prompt and {} completion tokens",
                        usage.prompt_tokens,
                        usage.completion_tokens
                    );
                }
                break;
            }
        }

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(AppError::Llm(
                "LLM response missing assistant content".to_string(),
            ));
        }

        tracing::debug!(
            "Reassembled {} chars from {} fragments",
            answer.len(),
            fragments
        );
        Ok(answer.to_string())
    }
}

impl std::fmt::Debug for AnswerSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerSynthesizer")
            .field("provider", &self.client.provider_name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use topica_llm::{decode_chat_stream, ChatRole, LlmStream, LlmStreamChunk};

    /// What the stub returns from `stream`.
    pub(crate) enum StubReply {
        Chunks(Vec<AppResult<LlmStreamChunk>>),
        Raw(Vec<&'static str>),
        Fail(String),
    }

    /// LLM stub that records requests and counts calls.
    pub(crate) struct StubLlm {
        reply: Mutex<Option<StubReply>>,
        pub calls: AtomicUsize,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl StubLlm {
        pub(crate) fn new(reply: StubReply) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn answering(text: &str) -> Self {
            Self::new(StubReply::Chunks(vec![
                Ok(LlmStreamChunk::partial(text)),
                Ok(LlmStreamChunk::finished("")),
            ]))
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for StubLlm {
        fn provider_name(&self) -> &str {
            "stub"
        }

        async fn stream(&self, request: &ChatRequest) -> AppResult<LlmStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());

            match self.reply.lock().unwrap().take() {
                Some(StubReply::Chunks(chunks)) => Ok(Box::pin(futures::stream::iter(chunks))),
                Some(StubReply::Raw(lines)) => {
                    let bytes = lines
                        .into_iter()
                        .map(|line| Ok::<_, std::io::Error>(line.as_bytes().to_vec()));
                    Ok(decode_chat_stream(futures::stream::iter(bytes)))
                }
                Some(StubReply::Fail(msg)) => Err(AppError::Llm(msg)),
                None => Err(AppError::Llm("stub already used".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_reassembles_fragments_in_order() {
        let stub = Arc::new(StubLlm::new(StubReply::Chunks(vec![
            Ok(LlmStreamChunk::partial("Hel")),
            Ok(LlmStreamChunk::partial("lo")),
            Ok(LlmStreamChunk::partial(" world")),
            Ok(LlmStreamChunk::finished("")),
        ])));
        let synth = AnswerSynthesizer::new(stub.clone(), "gpt-oss:20b");

        assert_eq!(synth.synthesize("sys", "user").await.unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped_end_to_end() {
        let stub = Arc::new(StubLlm::new(StubReply::Raw(vec![
            "{\"message\":{\"content\":\"Hel\"},\"done\":false}\n{\"message\":",
            "{\"content\":\"lo\"},\"done\":false}\nnot json at all\n",
            "{\"message\":{\"content\":\" world\"},\"done\":false}\n",
            "{\"message\":{\"content\":\"\"},\"done\":true}\n",
        ])));
        let synth = AnswerSynthesizer::new(stub, "gpt-oss:20b");

        assert_eq!(synth.synthesize("sys", "user").await.unwrap(), "Hello world");
    }

    #[tokio::test]
    async fn test_stops_at_done_marker() {
        let stub = Arc::new(StubLlm::new(StubReply::Chunks(vec![
            Ok(LlmStreamChunk::partial("Answer")),
            Ok(LlmStreamChunk::finished(".")),
            Ok(LlmStreamChunk::partial(" trailing noise")),
        ])));
        let synth = AnswerSynthesizer::new(stub, "m");

        assert_eq!(synth.synthesize("s", "u").await.unwrap(), "Answer.");
    }

    #[tokio::test]
    async fn test_sends_system_then_user() {
        let stub = Arc::new(StubLlm::answering("ok"));
        let synth = AnswerSynthesizer::new(stub.clone(), "gpt-oss:20b").with_temperature(Some(0.2));

        synth.synthesize("rules", "question").await.unwrap();

        let requests = stub.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.model, "gpt-oss:20b");
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert_eq!(request.messages[0].content, "rules");
        assert_eq!(request.messages[1].role, ChatRole::User);
        assert_eq!(request.messages[1].content, "question");
    }

    #[tokio::test]
    async fn test_blank_answer_is_error() {
        let stub = Arc::new(StubLlm::new(StubReply::Chunks(vec![
            Ok(LlmStreamChunk::partial("  \n")),
            Ok(LlmStreamChunk::finished("")),
        ])));
        let synth = AnswerSynthesizer::new(stub, "m");

        match synth.synthesize("s", "u").await {
            Err(AppError::Llm(msg)) => assert!(msg.contains("missing assistant content")),
            other => panic!("expected LLM error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_error() {
        let stub = Arc::new(StubLlm::new(StubReply::Fail(
            "Unable to contact LLM service".to_string(),
        )));
        let synth = AnswerSynthesizer::new(stub, "m");
        assert!(matches!(synth.synthesize("s", "u").await, Err(AppError::Llm(_))));
    }

    #[tokio::test]
    async fn test_mid_stream_error_is_propagated() {
        let stub = Arc::new(StubLlm::new(StubReply::Chunks(vec![
            Ok(LlmStreamChunk::partial("Partial")),
            Err(AppError::Llm("Stream error: connection reset".to_string())),
        ])));
        let synth = AnswerSynthesizer::new(stub, "m");
        assert!(matches!(synth.synthesize("s", "u").await, Err(AppError::Llm(_))));
    }
}
