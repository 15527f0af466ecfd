//! LLM client wrapper for booksplit
//!
//! Resolves the configured preset to a provider and runs every request
//! through the retry policy.

use anyhow::{Context, Result};
use async_trait::async_trait;
use llm_client::{
    Config, LlmProvider, LlmRequest, RetryPolicy, complete_with_retry, get_provider,
};
use log::{debug, info};
use std::sync::Arc;

use crate::boundary::{BoundaryRewriter, RewriteRequest};
use crate::prompts::{REWRITE_SYSTEM_PROMPT, rewrite_prompt};

const PROGRAM_NAME: &str = "booksplit";

/// Wrapper around LLM providers for booksplit
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl LlmClient {
    /// Create a new LLM client
    ///
    /// If preset_name is None, uses the default preset from config.
    pub fn from_preset(preset_name: Option<&str>, retry: RetryPolicy) -> Result<Self> {
        let config = Config::load().context("Failed to load LLM configuration")?;

        let preset_name =
            preset_name.unwrap_or_else(|| config.get_default_for_program(PROGRAM_NAME));
        let preset = config
            .get_preset(preset_name)
            .context(format!("Unknown preset: {}", preset_name))?;

        let provider_config = config.get_provider_config(&preset.provider);
        let provider = get_provider(preset, provider_config).context(format!(
            "Failed to initialize provider '{}' for preset '{}'",
            preset.provider, preset_name
        ))?;

        info!(
            "Using LLM provider: {} (model: {})",
            provider.name(),
            preset.model
        );

        Ok(Self {
            provider: Arc::from(provider),
            retry,
        })
    }

    /// Wrap an existing provider
    pub fn with_provider(provider: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Send a completion request, retrying transient failures
    pub async fn complete(&self, request: LlmRequest) -> Result<String> {
        let response = complete_with_retry(self.provider.as_ref(), &request, &self.retry)
            .await
            .context("LLM request failed")?;

        if let Some(usage) = &response.usage {
            debug!(
                "Tokens: {} in, {} out",
                usage.input_tokens, usage.output_tokens
            );
        }

        Ok(response.content)
    }
}

#[async_trait]
impl BoundaryRewriter for LlmClient {
    async fn rewrite(&self, request: RewriteRequest<'_>) -> Result<String> {
        let request = LlmRequest::new(rewrite_prompt(&request))
            .with_system(REWRITE_SYSTEM_PROMPT)
            .with_max_tokens(2000)
            .with_temperature(0.1);
        self.complete(request).await
    }
}
