//! Checking phase content against bible rules.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::model::{BibleRule, RuleKind};

/// A checkable rule the content failed.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub rule_id: String,
    pub kind: RuleKind,
    pub rule: String,
    pub detail: String,
}

/// Result of validating one phase against a project's rules.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    /// Guideline rules, listed for the writer to review.
    pub advisories: Vec<String>,
    pub checked: usize,
    pub passed: usize,
    /// 0-100; 100 when no rule is checkable.
    pub score: u8,
}

impl ValidationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Validate content against rules.
#[must_use]
pub fn validate(rules: &[BibleRule], content: &Value) -> ValidationReport {
    let text = flatten_text(content);
    let word_count = text.split_whitespace().count();

    let mut violations = Vec::new();
    let mut advisories = Vec::new();
    let mut checked = 0;

    for rule in rules {
        let failure = match (rule.kind, rule.term.as_deref(), rule.limit) {
            (RuleKind::Forbidden, Some(term), _) => {
                contains_term(&text, term).then(|| format!("uses forbidden term \"{term}\""))
            }
            (RuleKind::Required, Some(term), _) => {
                (!contains_term(&text, term)).then(|| format!("missing required term \"{term}\""))
            }
            (RuleKind::MaxWords, _, Some(limit)) => {
                let over = i64::try_from(word_count).map_or(true, |n| n > limit);
                over.then(|| format!("{word_count} words exceeds the limit of {limit}"))
            }
            _ => {
                advisories.push(rule.text.clone());
                continue;
            }
        };

        checked += 1;
        if let Some(detail) = failure {
            violations.push(Violation {
                rule_id: rule.id.clone(),
                kind: rule.kind,
                rule: rule.text.clone(),
                detail,
            });
        }
    }

    let passed = checked - violations.len();
    let score = if checked == 0 {
        100
    } else {
        u8::try_from(passed * 100 / checked).unwrap_or(100)
    };

    ValidationReport {
        violations,
        advisories,
        checked,
        passed,
        score,
    }
}

/// Collect every string and number in a JSON document, one per line.
#[must_use]
pub fn flatten_text(value: &Value) -> String {
    fn walk(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) => out.push(s.clone()),
            Value::Number(n) => out.push(n.to_string()),
            Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            Value::Object(map) => map.values().for_each(|v| walk(v, out)),
            Value::Null | Value::Bool(_) => {}
        }
    }

    let mut parts = Vec::new();
    walk(value, &mut parts);
    parts.join("\n")
}

/// Case-insensitive whole-word search.
fn contains_term(text: &str, term: &str) -> bool {
    let pattern = format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(term));
    Regex::new(&pattern).is_ok_and(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RuleCategory;
    use serde_json::json;

    fn rule(kind: RuleKind, term: Option<&str>, limit: Option<i64>) -> BibleRule {
        BibleRule {
            id: format!("rule_{}", kind.as_str()),
            project_id: "proj_1".to_string(),
            document_id: "doc_1".to_string(),
            category: RuleCategory::General,
            kind,
            text: format!("{} rule", kind.as_str()),
            term: term.map(str::to_string),
            limit,
            created_at: 0,
        }
    }

    #[test]
    fn test_clean_content_scores_100() {
        let rules = vec![
            rule(RuleKind::Forbidden, Some("suddenly"), None),
            rule(RuleKind::Required, Some("lighthouse"), None),
            rule(RuleKind::MaxWords, None, Some(20)),
        ];
        let report = validate(&rules, &json!({"logline": "A Lighthouse keeper waits."}));
        assert!(report.is_clean());
        assert_eq!(report.checked, 3);
        assert_eq!(report.score, 100);
    }

    #[test]
    fn test_violations_are_reported() {
        let rules = vec![
            rule(RuleKind::Forbidden, Some("suddenly"), None),
            rule(RuleKind::Required, Some("lighthouse"), None),
            rule(RuleKind::MaxWords, None, Some(3)),
        ];
        let content = json!({"scenes": [{"action": "Suddenly, the storm hits the harbour."}]});
        let report = validate(&rules, &content);

        assert_eq!(report.violations.len(), 3);
        assert_eq!(report.passed, 0);
        assert_eq!(report.score, 0);
        assert!(report.violations[2].detail.contains("exceeds the limit of 3"));
    }

    #[test]
    fn test_whole_word_matching() {
        let rules = vec![rule(RuleKind::Forbidden, Some("cat"), None)];
        let report = validate(&rules, &json!({"text": "A catalogue of scenes"}));
        assert!(report.is_clean());
    }

    #[test]
    fn test_guidelines_are_advisory() {
        let rules = vec![
            rule(RuleKind::Guideline, None, None),
            rule(RuleKind::Forbidden, Some("very"), None),
        ];
        let report = validate(&rules, &json!({"text": "very dark"}));
        assert_eq!(report.advisories, vec!["guideline rule".to_string()]);
        assert_eq!(report.checked, 1);
        assert_eq!(report.score, 0);
    }

    #[test]
    fn test_no_checkable_rules() {
        let report = validate(&[], &json!({}));
        assert_eq!(report.checked, 0);
        assert_eq!(report.score, 100);
    }

    #[test]
    fn test_flatten_text() {
        let text = flatten_text(&json!({"a": ["x", 2, null], "b": {"c": "y"}, "d": true}));
        assert_eq!(text, "x\n2\ny");
    }
}
