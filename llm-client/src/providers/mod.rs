//! LLM provider implementations

pub mod mock;
mod openai_compatible;

pub use mock::MockProvider;
pub use openai_compatible::OpenAICompatibleProvider;

use crate::config::{ModelPreset, ProviderConfig};
use crate::error::{LlmError, Result};
use crate::provider::LlmProvider;

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    OpenRouter,
}

impl ProviderKind {
    /// Parse provider kind from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" | "open-ai" | "open_ai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            _ => Err(LlmError::ConfigError(format!("Unknown provider: {}", s))),
        }
    }

    /// Get the environment variable name for this provider's API key
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::OpenRouter => "OpenRouter",
        }
    }
}

/// Create a provider instance from a preset and optional config
pub fn get_provider(
    preset: &ModelPreset,
    provider_config: Option<&ProviderConfig>,
) -> Result<Box<dyn LlmProvider>> {
    let kind = ProviderKind::from_str(&preset.provider)?;
    let api_key = get_api_key(provider_config, kind)?;

    match kind {
        ProviderKind::OpenAi => {
            let base_url = provider_config.and_then(|c| c.base_url.as_deref());
            Ok(Box::new(OpenAICompatibleProvider::openai(
                &preset.model,
                api_key,
                base_url,
            )?))
        }
        ProviderKind::OpenRouter => Ok(Box::new(OpenAICompatibleProvider::openrouter(
            &preset.model,
            api_key,
        )?)),
    }
}

/// Get API key from config or environment variable
fn get_api_key(config: Option<&ProviderConfig>, kind: ProviderKind) -> Result<String> {
    // Config takes precedence over the environment
    if let Some(key) = config.and_then(|c| c.api_key.clone()) {
        return Ok(key);
    }

    std::env::var(kind.env_var()).map_err(|_| LlmError::MissingApiKey {
        provider: kind.display_name().to_string(),
        env_var: kind.env_var().to_string(),
    })
}
