//! Prompt system for Topica.
//!
//! This crate provides prompt management for the question answering flow:
//! - A built-in grounded answering prompt
//! - Optional YAML overrides stored in the workspace
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{ask_prompt, builtin_prompt, load_prompt};
pub use types::{BuiltPrompt, PromptDefinition, ASK_PROMPT_ID};
