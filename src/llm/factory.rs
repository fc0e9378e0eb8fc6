//! LLM provider factory.
//!
//! Handles provider detection and creation.

use tracing::debug;

use super::anthropic::AnthropicProvider;
use super::ollama::OllamaProvider;
use super::provider::{BoxedLlm, LlmProvider};
use super::types::LlmProviderType;
use crate::config::{resolve_ollama_endpoint, LlmSettings};

/// Create an LLM provider based on settings.
///
/// Priority:
/// 1. Explicit provider in settings (Anthropic needs a key; Ollama must be reachable)
/// 2. Anthropic when an API key is present
/// 3. Ollama when the local server answers
///
/// Returns `None` if nothing is usable.
pub async fn create_llm_provider(settings: &LlmSettings) -> Option<BoxedLlm> {
    if let Some(provider_type) = settings.provider {
        return create_provider_by_type(provider_type, settings).await;
    }

    if let Some(provider) = anthropic_from(settings) {
        debug!("Using Anthropic provider (API key present)");
        return Some(BoxedLlm::new(provider));
    }

    let ollama = ollama_from(settings);
    if ollama.is_available().await {
        debug!("Using Ollama provider (server reachable)");
        return Some(BoxedLlm::new(ollama));
    }

    None
}

async fn create_provider_by_type(
    provider_type: LlmProviderType,
    settings: &LlmSettings,
) -> Option<BoxedLlm> {
    match provider_type {
        LlmProviderType::Anthropic => anthropic_from(settings).map(BoxedLlm::new),
        LlmProviderType::Ollama => {
            let provider = ollama_from(settings);
            if provider.is_available().await {
                Some(BoxedLlm::new(provider))
            } else {
                None
            }
        }
    }
}

fn anthropic_from(settings: &LlmSettings) -> Option<AnthropicProvider> {
    let key = settings.api_key.as_deref().filter(|k| !k.is_empty())?;
    let mut provider = AnthropicProvider::new(key);
    if let Some(model) = &settings.model {
        provider = provider.with_model(model.clone());
    }
    if settings.provider == Some(LlmProviderType::Anthropic) {
        if let Some(endpoint) = &settings.endpoint {
            provider = provider.with_base_url(endpoint.clone());
        }
    }
    Some(provider)
}

fn ollama_from(settings: &LlmSettings) -> OllamaProvider {
    OllamaProvider::new(resolve_ollama_endpoint(settings), settings.model.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_anthropic_without_key_is_none() {
        let settings = LlmSettings {
            provider: Some(LlmProviderType::Anthropic),
            ..LlmSettings::default()
        };
        assert!(create_llm_provider(&settings).await.is_none());
    }

    #[tokio::test]
    async fn test_key_selects_anthropic() {
        let settings = LlmSettings {
            api_key: Some("sk-test".to_string()),
            model: Some("claude-test".to_string()),
            ..LlmSettings::default()
        };
        let provider = create_llm_provider(&settings).await.unwrap();
        assert_eq!(provider.info().name, "anthropic");
        assert_eq!(provider.info().model, "claude-test");
    }
}
