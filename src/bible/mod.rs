//! Production Bible: style and format rules for a project.
//!
//! Rules are extracted from uploaded plain-text documents, fed into
//! regeneration prompts as guidance, and checked against phase content.

mod extract;
mod validate;

pub use extract::{ExtractedRule, extract_rules};
pub use validate::{ValidationReport, Violation, flatten_text, validate};

use std::fmt::Write as _;

use crate::model::BibleRule;

/// Render rules as a numbered list for prompts. Empty when there are none.
#[must_use]
pub fn render_guidance(rules: &[BibleRule]) -> String {
    let mut out = String::new();
    for (i, rule) in rules.iter().enumerate() {
        let _ = writeln!(out, "{}. [{}] {}", i + 1, rule.category.as_str(), rule.text);
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_guidance() {
        let rules: Vec<BibleRule> = extract_rules("Never use \"suddenly\"\nKeep it under 100 words")
            .into_iter()
            .map(|r| r.into_rule("proj_1", "doc_1"))
            .collect();
        let text = render_guidance(&rules);
        assert_eq!(
            text,
            "1. [general] Never use \"suddenly\"\n2. [format] Keep it under 100 words"
        );
        assert!(render_guidance(&[]).is_empty());
    }
}
