//! Retrieval-augmented question answering.
//!
//! Retrieved topics are excerpted into a `[DocN]`-tagged context, the LLM
//! answers from that context, and the answer is returned with the cited
//! topics.

pub mod ask;
pub mod citations;
pub mod context;
pub mod synth;
pub mod types;

pub use ask::{RetrievalPipeline, Stage, DEFAULT_TOP_K};
pub use citations::strip_dangling_citations;
pub use context::{excerpt, ContextBuilder, MIN_EXCERPT_CHARS};
pub use synth::AnswerSynthesizer;
pub use types::{Answer, AskError, AskErrorKind, CitedTopic, NO_RESULTS_MESSAGE};
