//! Ollama chat provider implementation.
//!
//! Talks to the `/api/chat` endpoint of a local Ollama runtime and always
//! requests a streamed response.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{ChatMessage, ChatRequest, LlmClient, LlmStream};
use crate::stream::decode_chat_stream;
use serde::Serialize;
use std::time::Duration;
use topica_core::{AppError, AppResult};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const CHAT_ENDPOINT: &str = "/api/chat";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Ollama chat request format.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama LLM client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    /// Create a new Ollama client with a custom base URL and the default timeout.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client that gives up when connecting, or waiting for the
    /// next piece of the response, takes longer than `timeout`.
    ///
    /// The limit restarts with every fragment received, so a long answer
    /// that keeps streaming is never cut off.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| AppError::Llm(format!("Failed to create HTTP client for Ollama: {}", e)))?;

        Ok(Self {
            base_url: normalize_base_url(base_url.into()),
            client,
        })
    }

    fn to_ollama_request<'a>(&self, request: &'a ChatRequest) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
            options: request
                .temperature
                .map(|temperature| OllamaOptions { temperature }),
        }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_OLLAMA_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .unwrap_or_else(|_| Self::new())
    }
}

fn normalize_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[tracing::instrument(skip(self, request), fields(model = %request.model, messages = request.messages.len()))]
    async fn stream(&self, request: &ChatRequest) -> AppResult<LlmStream> {
        tracing::info!("Starting streaming chat request to Ollama");

        let url = format!("{}{}", self.base_url, CHAT_ENDPOINT);

        let response = self
            .client
            .post(&url)
            .json(&self.to_ollama_request(request))
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Unable to contact LLM service: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "LLM request failed with status {}: {}",
                status, error_text
            )));
        }

        Ok(decode_chat_stream(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest::new(
            "llama3.2",
            vec![ChatMessage::system("rules"), ChatMessage::user("question")],
        )
    }

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::new();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = OllamaClient::with_base_url("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_ollama_request_conversion() {
        let client = OllamaClient::new();
        let chat = request().with_temperature(0.3);

        let body = serde_json::to_value(client.to_ollama_request(&chat)).unwrap();
        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_stream_decodes_ndjson_body() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"lo\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        );

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({"model": "llama3.2", "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri());
        let chunks: Vec<_> = client.stream(&request()).await.unwrap().collect().await;

        let text: String = chunks
            .iter()
            .map(|c| c.as_ref().unwrap().content.as_str())
            .collect();
        assert_eq!(text, "Hello");
        assert!(chunks.last().unwrap().as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn test_non_success_status_is_llm_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let client = OllamaClient::with_base_url(server.uri());
        match client.stream(&request()).await {
            Err(AppError::Llm(msg)) => {
                assert!(msg.contains("404"));
                assert!(msg.contains("model not found"));
            }
            Err(other) => panic!("expected LLM error, got {}", other),
            Ok(_) => panic!("expected LLM error, got a stream"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_is_llm_error() {
        // Port 9 (discard) is not expected to host an HTTP server
        let client =
            OllamaClient::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let result = client.stream(&request()).await;
        assert!(matches!(result, Err(AppError::Llm(_))));
    }

    /// Serve one chunked NDJSON response, pausing `gap` before each fragment.
    async fn slow_chat_server(fragments: Vec<String>, gap: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 8192];
            let _ = socket.read(&mut request).await.unwrap();

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\ntransfer-encoding: chunked\r\n\r\n",
                )
                .await
                .unwrap();
            for fragment in fragments {
                tokio::time::sleep(gap).await;
                let chunk = format!("{:x}\r\n{}\r\n", fragment.len(), fragment);
                socket.write_all(chunk.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
            socket.flush().await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_slow_stream_outlasting_timeout_is_complete() {
        let fragments: Vec<String> = ["Hel", "lo ", "wor", "ld"]
            .iter()
            .enumerate()
            .map(|(i, text)| {
                format!(
                    "{}\n",
                    serde_json::json!({
                        "message": {"role": "assistant", "content": text},
                        "done": i == 3,
                    })
                )
            })
            .collect();

        // Each gap is under the timeout, the whole response is not
        let base_url = slow_chat_server(fragments, Duration::from_millis(400)).await;
        let client = OllamaClient::with_timeout(base_url, Duration::from_secs(1)).unwrap();

        let chunks: Vec<_> = client.stream(&request()).await.unwrap().collect().await;
        let mut text = String::new();
        for chunk in &chunks {
            text.push_str(&chunk.as_ref().unwrap().content);
        }

        assert_eq!(text, "Hello world");
        assert!(chunks.last().unwrap().as_ref().unwrap().done);
    }
}
