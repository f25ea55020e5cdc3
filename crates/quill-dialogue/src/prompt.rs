//! System prompt given to the completion service.

use quill_core::Result;

use crate::templates::TemplateRegistry;
use crate::termination::END_OF_LETTER;

/// Build the rules text with the serialized template catalog embedded.
pub fn build_system_prompt(registry: &TemplateRegistry) -> Result<String> {
    let catalog = registry.serialize_all()?;
    Ok(format!(
        "You are a public documentation assistant.

Available letter templates (with required fields):
{catalog}

Rules:
1. First, identify which template best matches the user request.
2. Collect all required fields for that template, step by step.
3. Do not generate the letter until all required fields are collected.
4. Ask the user to specify the final output language (mandatory).
5. Once all required fields + language are available, generate the letter.

Output Rules:
- Output ONLY the letter text.
- No extra explanations or assistant chatter.
- Always end with {END_OF_LETTER} marker.
- Do not add text after {END_OF_LETTER}."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_catalog_verbatim() {
        let registry = TemplateRegistry::builtin();
        let prompt = build_system_prompt(&registry).unwrap();
        assert!(prompt.contains(&registry.serialize_all().unwrap()));
    }

    #[test]
    fn test_prompt_states_the_contract() {
        let prompt = build_system_prompt(&TemplateRegistry::builtin()).unwrap();
        assert!(prompt.starts_with("You are a public documentation assistant."));
        assert!(prompt.contains("output language"));
        assert!(prompt.contains("Always end with [END_OF_LETTER] marker."));
        assert!(prompt.contains("Do not add text after [END_OF_LETTER]."));
    }
}
