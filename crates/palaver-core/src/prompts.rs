//! Prompt file helpers.

/// Default system prompt used when a session has none configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/default_system_prompt.md"
));

/// Structured-reasoning block appended when chain-of-thought is enabled.
pub const CHAIN_OF_THOUGHT_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/chain_of_thought_prompt.md"
));

/// Instruction appended as a final user turn for auto-title generation.
pub const TITLE_PROMPT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/title_prompt.md"
));

/// First line of the chain-of-thought block, used as an idempotency marker.
///
/// `augment_with_chain_of_thought` may be called every time a session is
/// patched with `chain_of_thought = true`; the marker check prevents the
/// block from being appended twice.
pub const CHAIN_OF_THOUGHT_MARKER: &str = "## Structured reasoning";

/// Models allowed to run with the chain-of-thought augmentation.
pub const CHAIN_OF_THOUGHT_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "claude-3-5-sonnet",
    "llama-3.1-70b-instruct",
];

/// Appends the structured-reasoning block to `prompt` if not already present.
pub fn augment_with_chain_of_thought(prompt: &str) -> String {
    if prompt.contains(CHAIN_OF_THOUGHT_MARKER) {
        return prompt.to_string();
    }
    let base = prompt.trim_end();
    if base.is_empty() {
        CHAIN_OF_THOUGHT_PROMPT.trim_end().to_string()
    } else {
        format!("{}\n\n{}", base, CHAIN_OF_THOUGHT_PROMPT.trim_end())
    }
}

/// Returns true if `model` may use chain-of-thought prompting.
pub fn supports_chain_of_thought(model: &str) -> bool {
    CHAIN_OF_THOUGHT_MODELS.contains(&model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_augmentation_appends_once() {
        let once = augment_with_chain_of_thought("Be terse.");
        assert!(once.starts_with("Be terse."));
        assert!(once.contains(CHAIN_OF_THOUGHT_MARKER));

        let twice = augment_with_chain_of_thought(&once);
        assert_eq!(once, twice);
        assert_eq!(twice.matches(CHAIN_OF_THOUGHT_MARKER).count(), 1);
    }

    #[test]
    fn test_augmentation_on_empty_prompt() {
        let out = augment_with_chain_of_thought("");
        assert!(out.starts_with(CHAIN_OF_THOUGHT_MARKER));
    }

    #[test]
    fn test_model_allow_list() {
        assert!(supports_chain_of_thought("gpt-4o"));
        assert!(!supports_chain_of_thought("some-unknown-model"));
    }
}
