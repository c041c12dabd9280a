//! Prompt loader: built-in definitions with optional workspace overrides.

use crate::types::{PromptDefinition, ASK_PROMPT_ID};
use std::path::Path;
use topica_core::{AppError, AppResult};

const ASK_SYSTEM: &str = "You are an assistant that answers questions about an internal knowledge base. \
Answer only from the documents provided in the context. \
Cite every fact with the identifier of its source document, for example [Doc1] or [Doc2]. \
If part of the question is not covered by the documents, say so explicitly for that part. \
Never invent facts, sources or document identifiers.";

const ASK_TEMPLATE: &str = "Question: {{question}}\n\n\
Available context:\n{{context}}\n\n\
Write a factual and concise answer based only on this context.";

/// The built-in grounded answering prompt.
pub fn ask_prompt() -> PromptDefinition {
    PromptDefinition {
        id: ASK_PROMPT_ID.to_string(),
        title: "Grounded answer with citations".to_string(),
        system: ASK_SYSTEM.to_string(),
        template: ASK_TEMPLATE.to_string(),
    }
}

/// The definition shipped with the binary for `id`, if any.
pub fn builtin_prompt(prompt_id: &str) -> Option<PromptDefinition> {
    match prompt_id {
        ASK_PROMPT_ID => Some(ask_prompt()),
        _ => None,
    }
}

/// Load a prompt definition by ID.
///
/// A file named `<id>.yml` in `.topica/prompts/` takes precedence over the
/// built-in definition of the same ID.
///
/// # Errors
/// Returns `AppError::Prompt` if the override cannot be read, parsed or
/// validated, or if no definition exists for `prompt_id`.
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".topica/prompts")
        .join(format!("{}.yml", prompt_id));

    if !prompt_file.exists() {
        tracing::debug!("No prompt override at {:?}, using built-in", prompt_file);
        return builtin_prompt(prompt_id)
            .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition, prompt_id)?;

    tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);

    Ok(definition)
}

fn validate_prompt(def: &PromptDefinition, expected_id: &str) -> AppResult<()> {
    if def.id != expected_id {
        return Err(AppError::Prompt(format!(
            "Prompt file declares id '{}' but was loaded as '{}'",
            def.id, expected_id
        )));
    }

    if def.system.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt system message cannot be empty".to_string(),
        ));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_override(dir: &Path, id: &str, content: &str) {
        let prompts_dir = dir.join(".topica/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(format!("{}.yml", id)), content).unwrap();
    }

    #[test]
    fn test_builtin_ask_prompt_mentions_citations() {
        let def = builtin_prompt(ASK_PROMPT_ID).unwrap();
        assert!(def.system.contains("[Doc1]"));
        assert!(def.template.contains("{{question}}"));
        assert!(def.template.contains("{{context}}"));
    }

    #[test]
    fn test_load_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let def = load_prompt(temp_dir.path(), ASK_PROMPT_ID).unwrap();
        assert_eq!(def, builtin_prompt(ASK_PROMPT_ID).unwrap());
    }

    #[test]
    fn test_load_override() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            ASK_PROMPT_ID,
            "id: rag.ask\ntitle: Custom\nsystem: Be brief.\ntemplate: \"Q: {{question}}\"\n",
        );

        let def = load_prompt(temp_dir.path(), ASK_PROMPT_ID).unwrap();
        assert_eq!(def.title, "Custom");
        assert_eq!(def.system, "Be brief.");
    }

    #[test]
    fn test_load_unknown_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), ASK_PROMPT_ID, "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), ASK_PROMPT_ID).is_err());
    }

    #[test]
    fn test_override_with_mismatched_id_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            ASK_PROMPT_ID,
            "id: other\ntitle: t\nsystem: s\ntemplate: x\n",
        );
        match load_prompt(temp_dir.path(), ASK_PROMPT_ID) {
            Err(AppError::Prompt(msg)) => assert!(msg.contains("other")),
            other => panic!("expected prompt error, got {:?}", other),
        }
    }

    #[test]
    fn test_override_with_blank_system_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            ASK_PROMPT_ID,
            "id: rag.ask\ntitle: t\nsystem: \"  \"\ntemplate: x\n",
        );
        assert!(load_prompt(temp_dir.path(), ASK_PROMPT_ID).is_err());
    }
}
