//! LLM request and provider types.

use serde::{Deserialize, Serialize};

/// Supported text-generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    Anthropic,
    Ollama,
}

impl LlmProviderType {
    /// Parse a provider name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Some(Self::Anthropic),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }
}

impl std::fmt::Display for LlmProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Provider metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
}

/// A single-turn completion: one system instruction, one user message.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Default output budget for one phase document.
    pub const DEFAULT_MAX_TOKENS: u32 = 4096;

    #[must_use]
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parse() {
        assert_eq!(LlmProviderType::parse("Claude"), Some(LlmProviderType::Anthropic));
        assert_eq!(LlmProviderType::parse("ollama"), Some(LlmProviderType::Ollama));
        assert_eq!(LlmProviderType::parse("gpt"), None);
        assert_eq!(LlmProviderType::Ollama.to_string(), "ollama");
    }
}
