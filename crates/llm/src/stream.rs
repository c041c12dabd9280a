//! Newline-delimited JSON decoding for streamed chat responses.
//!
//! Ollama streams one JSON object per line. Network chunks do not respect
//! line boundaries, so bytes are buffered until a full line is available.
//! Each line is decoded into a typed [`LlmStreamChunk`]; lines that do not
//! decode are dropped here and never reach the consumer.

use crate::client::{LlmStream, LlmStreamChunk, LlmUsage};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt::Display;
use topica_core::AppError;

/// One line of an Ollama `/api/chat` stream.
#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Splits a byte stream into complete lines.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append bytes and drain every complete line.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// Whatever is left once the stream ended without a trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Decode one NDJSON line. Returns `None` for blank or malformed lines.
pub(crate) fn parse_chat_line(line: &str) -> Option<LlmStreamChunk> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let parsed: ChatLine = match serde_json::from_str(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Skipping malformed stream fragment: {}", e);
            return None;
        }
    };

    let content = parsed
        .message
        .and_then(|message| message.content)
        .unwrap_or_default();

    let usage = parsed.done.then(|| {
        LlmUsage::new(
            parsed.prompt_eval_count.unwrap_or(0),
            parsed.eval_count.unwrap_or(0),
        )
    });

    Some(LlmStreamChunk {
        content,
        done: parsed.done,
        usage,
    })
}

struct DecodeState<S> {
    inner: S,
    buffer: LineBuffer,
    ready: VecDeque<LlmStreamChunk>,
    exhausted: bool,
}

impl<S> DecodeState<S> {
    fn enqueue(&mut self, line: &str) {
        if let Some(chunk) = parse_chat_line(line) {
            self.ready.push_back(chunk);
        }
    }
}

/// Turn a raw byte stream into typed chat fragments, preserving arrival order.
///
/// A transport error is yielded once as [`AppError::Llm`] and ends the stream.
pub fn decode_chat_stream<S, B, E>(bytes: S) -> LlmStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        inner: Box::pin(bytes),
        buffer: LineBuffer::new(),
        ready: VecDeque::new(),
        exhausted: false,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.ready.pop_front() {
                return Some((Ok(chunk), state));
            }
            if state.exhausted {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(bytes)) => {
                    for line in state.buffer.push(bytes.as_ref()) {
                        state.enqueue(&line);
                    }
                }
                Some(Err(e)) => {
                    state.exhausted = true;
                    return Some((Err(AppError::Llm(format!("Stream error: {}", e))), state));
                }
                None => {
                    state.exhausted = true;
                    if let Some(line) = state.buffer.finish() {
                        state.enqueue(&line);
                    }
                }
            }
        }
    });

    Box::pin(stream)
}
