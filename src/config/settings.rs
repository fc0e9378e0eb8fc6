//! User settings stored in `~/.muse/config.json`.

use crate::error::{Error, Result};
use crate::llm::LlmProviderType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// LLM provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: Option<LlmProviderType>,
    pub model: Option<String>,
    /// Base URL override (Ollama server or an Anthropic-compatible gateway)
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
}

/// Living Story settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LivingStorySettings {
    /// Apply regenerated proposals without waiting for approval.
    pub auto_apply: Option<bool>,
}

/// The config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MuseConfig {
    pub llm: Option<LlmSettings>,
    pub living_story: Option<LivingStorySettings>,
}

/// Get the config file path. `MUSE_CONFIG` overrides the default location.
///
/// # Errors
///
/// Returns `Config` if the home directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("MUSE_CONFIG") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    super::global_muse_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Load the configuration; a missing file yields the defaults.
///
/// # Errors
///
/// Returns `Config` if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<MuseConfig> {
    let path = config_path()?;

    if !path.exists() {
        return Ok(MuseConfig::default());
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve LLM settings. Priority: env var > config file > unset.
///
/// # Errors
///
/// Returns `Config` if the config file is unreadable or the provider
/// override names an unknown provider.
pub fn resolve_llm_settings() -> Result<LlmSettings> {
    let mut settings = load_config()?.llm.unwrap_or_default();

    if let Some(provider) = non_empty_env("MUSE_LLM_PROVIDER") {
        settings.provider = Some(LlmProviderType::parse(&provider).ok_or_else(|| {
            Error::Config(format!("Unknown LLM provider in MUSE_LLM_PROVIDER: {provider}"))
        })?);
    }
    if let Some(model) = non_empty_env("MUSE_LLM_MODEL") {
        settings.model = Some(model);
    }
    if let Some(key) = non_empty_env("ANTHROPIC_API_KEY") {
        settings.api_key = Some(key);
    }

    Ok(settings)
}

/// Resolve the Ollama server. Priority: `OLLAMA_ENDPOINT` > config > localhost.
#[must_use]
pub fn resolve_ollama_endpoint(settings: &LlmSettings) -> String {
    non_empty_env("OLLAMA_ENDPOINT")
        .or_else(|| settings.endpoint.clone())
        .unwrap_or_else(|| "http://localhost:11434".to_string())
}

/// Resolve the auto-apply flag. Priority: env var > config file > off.
///
/// # Errors
///
/// Returns `Config` if the config file is unreadable.
pub fn resolve_auto_apply() -> Result<bool> {
    if let Some(value) = non_empty_env("MUSE_AUTO_APPLY") {
        return Ok(super::is_truthy(&value));
    }
    Ok(load_config()?
        .living_story
        .and_then(|s| s.auto_apply)
        .unwrap_or(false))
}
