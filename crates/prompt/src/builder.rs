//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use std::collections::HashMap;
use topica_core::{AppError, AppResult};

/// Build a prompt from a definition and template variables.
///
/// The system message is taken verbatim; the user message is the rendered
/// template. Rendering is strict, so a template that references a variable
/// missing from `variables` fails instead of silently rendering nothing.
///
/// # Example
/// ```
/// use topica_prompt::{build_prompt, builtin_prompt, ASK_PROMPT_ID};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt(ASK_PROMPT_ID).unwrap();
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "What is the vacation policy?".to_string());
/// vars.insert("context".to_string(), "[Doc1] Leave\nURL: https://kb/leave".to_string());
///
/// let built = build_prompt(&def, &vars)?;
/// assert!(built.user.contains("vacation policy"));
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: &HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    if definition.system.trim().is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt {} has an empty system message",
            definition.id
        )));
    }

    let user = render_template(&definition.template, variables)?;

    Ok(BuiltPrompt {
        system: definition.system.clone(),
        user,
        source_prompt_id: definition.id.clone(),
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::builtin_prompt;
    use crate::types::ASK_PROMPT_ID;

    fn vars(question: &str, context: &str) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context.to_string());
        vars
    }

    #[test]
    fn test_render_simple_template() {
        let result = render_template("Question: {{question}}", &vars("Hello, world!", ""));
        assert_eq!(result.unwrap(), "Question: Hello, world!");
    }

    #[test]
    fn test_render_does_not_escape() {
        let result = render_template("{{context}}", &vars("", "<a href=\"x\">&</a>"));
        assert_eq!(result.unwrap(), "<a href=\"x\">&</a>");
    }

    #[test]
    fn test_build_ask_prompt() {
        let def = builtin_prompt(ASK_PROMPT_ID).unwrap();
        let context = "[Doc1] Onboarding\nURL: https://kb.example/onboarding\nExcerpt: Day one.";

        let built = build_prompt(&def, &vars("How does onboarding work?", context)).unwrap();

        assert_eq!(built.system, def.system);
        assert!(built.user.starts_with("Question: How does onboarding work?"));
        assert!(built.user.contains(context));
        assert_eq!(built.source_prompt_id, ASK_PROMPT_ID);
    }

    #[test]
    fn test_missing_variable_is_error() {
        let result = render_template("Question: {{missing}}", &HashMap::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_system_is_error() {
        let mut def = builtin_prompt(ASK_PROMPT_ID).unwrap();
        def.system = String::new();
        assert!(build_prompt(&def, &vars("q", "c")).is_err());
    }
}
