//! Rule extraction from plain-text bible documents.
//!
//! Each non-empty line is matched against a handful of patterns. Lines that
//! read like instructions become rules; everything else is ignored.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::model::{BibleRule, RuleCategory, RuleKind};

/// A quoted phrase or a single bare word.
const TERM: &str = r#"(?:(?:the|a|an)\s+)?(?:(?:word|term|phrase|name)\s+)?(?:"([^"]+)"|'([^']+)'|([\w-]+))"#;

static FORBIDDEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:never|do not|don't|avoid|no)\s+(?:use|using|say|saying|mention|mentioning|include|including)\s+{TERM}"
    ))
    .expect("valid regex")
});

static REQUIRED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:always|must)\s+(?:include|mention|use|feature)\s+{TERM}"
    ))
    .expect("valid regex")
});

static MAX_WORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:under|at most|no more than|maximum of|max)\s+(\d+)\s+words\b")
        .expect("valid regex")
});

static GUIDELINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:must|should|always|never|avoid|prefer)\b").expect("valid regex")
});

/// Leading bullets and list numbering: `- `, `* `, `• `, `1. `, `2) `, `a) `.
static LIST_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*+•]\s+|\d+[.)]\s+|[a-zA-Z][.)]\s+)").expect("valid regex")
});

/// Keyword table for categorisation, checked in order.
const CATEGORY_KEYWORDS: &[(RuleCategory, &[&str])] = &[
    (
        RuleCategory::Format,
        &["format", "page", "font", "heading", "slug", "words", "length"],
    ),
    (
        RuleCategory::Character,
        &["character", "protagonist", "villain", "hero", "name"],
    ),
    (RuleCategory::Tone, &["tone", "mood", "voice", "humor", "dark"]),
    (
        RuleCategory::Style,
        &["style", "dialogue", "prose", "tense", "adjective"],
    ),
    (
        RuleCategory::Content,
        &["violence", "profanity", "content", "rating", "swear"],
    ),
];

/// A rule found in a document, before it is given an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedRule {
    pub category: RuleCategory,
    pub kind: RuleKind,
    pub text: String,
    pub term: Option<String>,
    pub limit: Option<i64>,
}

impl ExtractedRule {
    /// Attach the rule to a stored document.
    #[must_use]
    pub fn into_rule(self, project_id: &str, document_id: &str) -> BibleRule {
        BibleRule {
            id: format!("rule_{}", &uuid::Uuid::new_v4().to_string()[..12]),
            project_id: project_id.to_string(),
            document_id: document_id.to_string(),
            category: self.category,
            kind: self.kind,
            text: self.text,
            term: self.term,
            limit: self.limit,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Extract rules from a document body, in line order.
#[must_use]
pub fn extract_rules(body: &str) -> Vec<ExtractedRule> {
    body.lines().filter_map(extract_line).collect()
}

fn extract_line(raw: &str) -> Option<ExtractedRule> {
    let text = LIST_MARKER_RE.replace(raw, "").trim().to_string();
    if text.is_empty() || is_heading(&text) {
        return None;
    }

    let (kind, term, limit) = if let Some(caps) = FORBIDDEN_RE.captures(&text) {
        (RuleKind::Forbidden, first_group(&caps), None)
    } else if let Some(caps) = REQUIRED_RE.captures(&text) {
        (RuleKind::Required, first_group(&caps), None)
    } else if let Some(caps) = MAX_WORDS_RE.captures(&text) {
        let limit = caps.get(1).and_then(|m| m.as_str().parse::<i64>().ok());
        (RuleKind::MaxWords, None, limit)
    } else if GUIDELINE_RE.is_match(&text) {
        (RuleKind::Guideline, None, None)
    } else {
        return None;
    };

    Some(ExtractedRule {
        category: categorize(&text),
        kind,
        text,
        term,
        limit,
    })
}

fn is_heading(line: &str) -> bool {
    line.starts_with('#') || (line.ends_with(':') && !GUIDELINE_RE.is_match(line))
}

fn first_group(caps: &regex::Captures<'_>) -> Option<String> {
    (1..=3)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Whole-word keyword match; a trailing plural `s` is accepted.
fn categorize(text: &str) -> RuleCategory {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let mentions = |keyword: &str| {
        words
            .iter()
            .any(|w| *w == keyword || w.strip_suffix('s') == Some(keyword))
    };

    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| mentions(k)))
        .map_or(RuleCategory::General, |(category, _)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_with_quoted_and_bare_terms() {
        let rules = extract_rules("- Never use \"suddenly\" in prose.\n2. Don't mention Atlantis");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].kind, RuleKind::Forbidden);
        assert_eq!(rules[0].term.as_deref(), Some("suddenly"));
        assert_eq!(rules[0].category, RuleCategory::Style);
        assert_eq!(rules[0].text, "Never use \"suddenly\" in prose.");
        assert_eq!(rules[1].term.as_deref(), Some("Atlantis"));
    }

    #[test]
    fn test_required_rule() {
        let rules = extract_rules("The hero must feature the word 'lighthouse'");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].kind, RuleKind::Required);
        assert_eq!(rules[0].term.as_deref(), Some("lighthouse"));
        assert_eq!(rules[0].category, RuleCategory::Character);
    }

    #[test]
    fn test_articles_are_not_terms() {
        let rules = extract_rules("Always mention the train.");
        assert_eq!(rules[0].term.as_deref(), Some("train"));
    }

    #[test]
    fn test_max_words_rule() {
        let rules = extract_rules("* Keep each summary under 150 words");
        assert_eq!(rules[0].kind, RuleKind::MaxWords);
        assert_eq!(rules[0].limit, Some(150));
        assert_eq!(rules[0].category, RuleCategory::Format);
    }

    #[test]
    fn test_guidelines_headings_and_prose() {
        let body = "# Tone\n\nThe mood should stay dark.\nOur show is set in Maine.\nCharacters:\n";
        let rules = extract_rules(body);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].kind, RuleKind::Guideline);
        assert_eq!(rules[0].category, RuleCategory::Tone);
    }

    #[test]
    fn test_category_keywords_match_whole_words() {
        assert_eq!(categorize("Keep the pacing intense"), RuleCategory::General);
        assert_eq!(categorize("Never show the homepage"), RuleCategory::General);
        assert_eq!(categorize("Use present tense"), RuleCategory::Style);
        assert_eq!(categorize("Villains should never win"), RuleCategory::Character);
    }

    #[test]
    fn test_category_fallback_is_general() {
        let rules = extract_rules("Always prefer practical locations");
        assert_eq!(rules[0].category, RuleCategory::General);
    }

    #[test]
    fn test_into_rule_assigns_identity() {
        let rule = extract_rules("Avoid using \"very\"")
            .remove(0)
            .into_rule("proj_1", "doc_1");
        assert!(rule.id.starts_with("rule_"));
        assert_eq!(rule.document_id, "doc_1");
        assert_eq!(rule.term.as_deref(), Some("very"));
    }
}
