//! Prompt types for Topica.
//!
//! This module defines the domain entities for the prompt system.

use serde::{Deserialize, Serialize};

/// Identifier of the grounded answering prompt.
pub const ASK_PROMPT_ID: &str = "rag.ask";

/// A prompt definition, either built in or loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Instructions sent as the system message
    pub system: String,

    /// User message template with Handlebars syntax
    pub template: String,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message
    pub system: String,

    /// User message
    pub user: String,

    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: rag.ask
title: Grounded answer
system: Answer from the context only.
template: "Question: {{question}}"
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "rag.ask");
        assert_eq!(def.system, "Answer from the context only.");
        assert_eq!(def.template, "Question: {{question}}");
    }

    #[test]
    fn test_prompt_definition_requires_system() {
        let yaml = "id: rag.ask\ntitle: t\ntemplate: x\n";
        assert!(serde_yaml::from_str::<PromptDefinition>(yaml).is_err());
    }
}
