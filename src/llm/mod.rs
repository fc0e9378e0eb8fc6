//! Text generation providers.
//!
//! Phase generation and Living Story regeneration both go through the
//! [`LlmProvider`] trait:
//!
//! - **Anthropic**: Messages API, selected when an API key is configured
//! - **Ollama**: local server, selected when reachable
//!
//! # Configuration
//!
//! Settings come from `~/.muse/config.json` with env overrides
//! (`ANTHROPIC_API_KEY`, `MUSE_LLM_PROVIDER`, `MUSE_LLM_MODEL`, `OLLAMA_ENDPOINT`).

mod anthropic;
mod factory;
mod ollama;
mod provider;
#[cfg(test)]
pub(crate) mod stub;
mod types;

pub use anthropic::AnthropicProvider;
pub use factory::create_llm_provider;
pub use ollama::OllamaProvider;
pub use provider::{BoxedLlm, LlmProvider};
pub use types::{CompletionRequest, LlmProviderType, ProviderInfo};

/// Take the body of the first Markdown code fence in model output.
///
/// Models often wrap JSON in ```` ```json ```` blocks even when told not to,
/// sometimes after a line of prose. Text without a fence is returned trimmed.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let rest = &trimmed[start + 3..];

    // An info string (`json`, `JSON`) only counts when whitespace follows it.
    let tag_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')))
        .unwrap_or(rest.len());
    let body = if rest[tag_len..].starts_with(char::is_whitespace) {
        &rest[tag_len..]
    } else {
        rest
    };

    body.find("```").map_or(body, |end| &body[..end]).trim()
}

/// Parse model output as a JSON document.
///
/// # Errors
///
/// Returns `Llm` if the text (after fence stripping) is not valid JSON.
pub fn parse_json_output(text: &str) -> crate::error::Result<serde_json::Value> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| crate::error::Error::Llm(format!("Model returned invalid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n[1]\n```\n"), "[1]");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_fence_after_prose() {
        let reply = "Here is the updated scenes document:\n```json\n{\"scenes\": []}\n```\nLet me know!";
        assert_eq!(strip_code_fence(reply), "{\"scenes\": []}");
        let value = parse_json_output(reply).unwrap();
        assert_eq!(value["scenes"], serde_json::json!([]));
    }

    #[test]
    fn test_single_line_fence() {
        let value = parse_json_output("```json {\"logline\": \"x\"} ```").unwrap();
        assert_eq!(value["logline"], "x");
    }

    #[test]
    fn test_parse_json_output() {
        let value = parse_json_output("```json\n{\"logline\": \"x\"}\n```").unwrap();
        assert_eq!(value["logline"], "x");
        assert!(parse_json_output("Sure! Here it is").is_err());
    }
}
