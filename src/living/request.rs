//! Regeneration requests sent to the LLM provider.

use std::fmt::Write as _;

use serde_json::Value;

use crate::llm::CompletionRequest;
use crate::model::{FieldChange, Phase};

const SYSTEM: &str = "You maintain consistency across the phases of a story in development. \
An upstream phase was edited. Rewrite the target phase so it agrees with the edit while \
keeping everything the edit does not touch. Reply with a single JSON document in the same \
shape as the current target content and nothing else.";

/// Everything the provider needs to regenerate one downstream phase.
#[derive(Debug, Clone)]
pub struct RegenerationRequest<'a> {
    pub project_title: &'a str,
    pub source_phase: Phase,
    pub source_content: &'a Value,
    pub target_phase: Phase,
    pub current_target: Option<&'a Value>,
    pub changes: &'a [FieldChange],
    /// Bible guidance rendered as numbered text (may be empty).
    pub guidance: &'a str,
}

impl RegenerationRequest<'_> {
    /// Render into a completion request.
    #[must_use]
    pub fn to_completion(&self, max_tokens: u32) -> CompletionRequest {
        let mut prompt = String::new();
        let _ = writeln!(prompt, "Project: {}", self.project_title);
        let _ = writeln!(
            prompt,
            "\nEdited phase: {} (phase {})",
            self.source_phase,
            self.source_phase.number()
        );
        let _ = writeln!(prompt, "{}", pretty(self.source_content));

        prompt.push_str("\nWhat changed:\n");
        for change in self.changes {
            let _ = writeln!(prompt, "- {} {}", change.kind.as_str(), change.path);
        }

        let _ = writeln!(
            prompt,
            "\nTarget phase: {} (phase {})",
            self.target_phase,
            self.target_phase.number()
        );
        match self.current_target {
            Some(current) => {
                let _ = writeln!(prompt, "Current content:\n{}", pretty(current));
            }
            None => prompt.push_str("The target phase has no content yet; write it from scratch.\n"),
        }

        if !self.guidance.is_empty() {
            let _ = writeln!(prompt, "\nProduction bible rules:\n{}", self.guidance);
        }

        CompletionRequest::new(SYSTEM, prompt).with_max_tokens(max_tokens)
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
