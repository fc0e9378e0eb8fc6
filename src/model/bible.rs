//! Production bible models.
//!
//! A bible document is user-supplied style/format guidance. Rules are
//! extracted from it line by line and stored next to it.

use serde::{Deserialize, Serialize};

/// An uploaded bible document (plain text).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BibleDocument {
    /// Unique identifier (`doc_` + 12 uuid chars)
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub body: String,
    pub created_at: i64,
}

impl BibleDocument {
    pub fn new(project_id: &str, title: &str, body: &str) -> Self {
        Self {
            id: format!("doc_{}", &uuid::Uuid::new_v4().to_string()[..12]),
            project_id: project_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// What part of the writing a rule is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Format,
    Style,
    Character,
    Tone,
    Content,
    General,
}

impl RuleCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Style => "style",
            Self::Character => "character",
            Self::Tone => "tone",
            Self::Content => "content",
            Self::General => "general",
        }
    }

    #[must_use]
    pub fn from_db(s: &str) -> Self {
        match s {
            "format" => Self::Format,
            "style" => Self::Style,
            "character" => Self::Character,
            "tone" => Self::Tone,
            "content" => Self::Content,
            _ => Self::General,
        }
    }
}

/// How a rule is checked against content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// `term` must not appear.
    Forbidden,
    /// `term` must appear.
    Required,
    /// Word count must not exceed `limit`.
    MaxWords,
    /// Advisory only.
    Guideline,
}

impl RuleKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::Required => "required",
            Self::MaxWords => "max_words",
            Self::Guideline => "guideline",
        }
    }

    #[must_use]
    pub fn from_db(s: &str) -> Self {
        match s {
            "forbidden" => Self::Forbidden,
            "required" => Self::Required,
            "max_words" => Self::MaxWords,
            _ => Self::Guideline,
        }
    }

    /// Whether the validator can decide pass/fail for this rule.
    #[must_use]
    pub const fn is_checkable(&self) -> bool {
        !matches!(self, Self::Guideline)
    }
}

/// A stored rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BibleRule {
    /// Unique identifier (`rule_` + 12 uuid chars)
    pub id: String,
    pub project_id: String,
    pub document_id: String,
    pub category: RuleCategory,
    pub kind: RuleKind,
    /// The source line, cleaned of bullets and numbering
    pub text: String,
    pub term: Option<String>,
    pub limit: Option<i64>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_kind_storage_names() {
        for kind in [RuleKind::Forbidden, RuleKind::Required, RuleKind::MaxWords, RuleKind::Guideline] {
            assert_eq!(RuleKind::from_db(kind.as_str()), kind);
        }
        assert!(RuleKind::MaxWords.is_checkable());
        assert!(!RuleKind::Guideline.is_checkable());
    }

    #[test]
    fn test_category_fallback() {
        assert_eq!(RuleCategory::from_db("tone"), RuleCategory::Tone);
        assert_eq!(RuleCategory::from_db("whatever"), RuleCategory::General);
    }
}
