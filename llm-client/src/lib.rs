//! Shared LLM client library for the booksplit workspace
//!
//! Provides a unified interface over OpenAI-compatible chat completion
//! services, a scriptable mock for tests, and a bounded retry policy with
//! exponential backoff.

pub mod config;
pub mod error;
pub mod provider;
pub mod providers;
pub mod retry;

pub use config::{Config, ModelPreset, ProviderConfig};
pub use error::{LlmError, Result};
pub use provider::{LlmProvider, LlmRequest, LlmResponse, TokenUsage};
pub use providers::{MockProvider, ProviderKind, get_provider};
pub use retry::{RetryPolicy, complete_with_retry};
