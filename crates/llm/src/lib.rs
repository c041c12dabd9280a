//! LLM integration crate for Topica.
//!
//! Provides a provider-agnostic, chat-style abstraction over Large Language
//! Models. Responses are always consumed as a stream of fragments.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default), via `/api/chat`
//!
//! # Example
//! ```no_run
//! use futures::StreamExt;
//! use topica_llm::{ChatMessage, ChatRequest, LlmClient, OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = ChatRequest::new("llama3.2", vec![ChatMessage::user("Hello, world!")]);
//! let mut stream = client.stream(&request).await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod stream;

// Re-export main types
pub use client::{ChatMessage, ChatRequest, ChatRole, LlmClient, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::create_client;
pub use providers::OllamaClient;
pub use stream::decode_chat_stream;
