//! Mock LLM provider for testing
//!
//! Replies are produced by a responder closure, so a test can script a
//! sequence of replies, answer based on the prompt, or fail a number of
//! times before succeeding.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{LlmError, Result};
use crate::provider::{LlmProvider, LlmRequest, LlmResponse};

type Responder = Box<dyn Fn(&LlmRequest, usize) -> Result<String> + Send + Sync>;

/// A mock provider for testing retry, fallback and parsing behavior
pub struct MockProvider {
    responder: Responder,
    /// Current call count
    call_count: AtomicUsize,
    /// Prompts received, in call order
    prompts: Mutex<Vec<String>>,
    /// Provider name for display
    name: &'static str,
}

impl MockProvider {
    /// Create a provider from a closure receiving the request and the
    /// zero-based call number
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&LlmRequest, usize) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            call_count: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            name: "mock",
        }
    }

    /// Create a provider that fails `n` times with the given error, then succeeds
    pub fn fails_then_succeeds(n: usize, error: LlmError, response: &str) -> Self {
        let response = response.to_string();
        Self::from_fn(move |_, call| {
            if call < n {
                Err(clone_error(&error))
            } else {
                Ok(response.clone())
            }
        })
    }

    /// Create a provider that always fails with the given error
    pub fn always_fails(error: LlmError) -> Self {
        Self::from_fn(move |_, _| Err(clone_error(&error)))
    }

    /// Create a provider that always succeeds
    pub fn always_succeeds(response: &str) -> Self {
        let response = response.to_string();
        Self::from_fn(move |_, _| Ok(response.clone()))
    }

    /// Create a provider that returns the given replies in order, then
    /// empty replies once the script runs out
    pub fn scripted<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue: Mutex<VecDeque<String>> =
            Mutex::new(responses.into_iter().map(Into::into).collect());
        Self::from_fn(move |_, _| {
            Ok(queue
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_default())
        })
    }

    /// Get the number of times complete() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Set a custom provider name (useful for testing fallback scenarios)
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }

        let content = (self.responder)(&request, call_num)?;

        Ok(LlmResponse {
            content,
            model: "mock-model".to_string(),
            usage: None,
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Clone an LlmError (needed because LlmError doesn't implement Clone)
fn clone_error(err: &LlmError) -> LlmError {
    match err {
        LlmError::ServerOverloaded { message } => LlmError::ServerOverloaded {
            message: message.clone(),
        },
        LlmError::MissingApiKey { provider, env_var } => LlmError::MissingApiKey {
            provider: provider.clone(),
            env_var: env_var.clone(),
        },
        LlmError::RateLimited { retry_after } => LlmError::RateLimited {
            retry_after: *retry_after,
        },
        LlmError::ApiError {
            message,
            status_code,
        } => LlmError::ApiError {
            message: message.clone(),
            status_code: *status_code,
        },
        LlmError::RetriesExhausted { attempts, source } => LlmError::RetriesExhausted {
            attempts: *attempts,
            source: Box::new(clone_error(source)),
        },
        LlmError::ConfigError(s) => LlmError::ConfigError(s.clone()),
        LlmError::InvalidPreset(s) => LlmError::InvalidPreset(s.clone()),
        // For Io and Toml errors, we create a generic error since they can't be cloned
        LlmError::Io(_) => LlmError::ConfigError("IO error (mock)".to_string()),
        LlmError::TomlParse(_) => LlmError::ConfigError("TOML parse error (mock)".to_string()),
        LlmError::TomlSerialize(_) => {
            LlmError::ConfigError("TOML serialize error (mock)".to_string())
        }
    }
}
