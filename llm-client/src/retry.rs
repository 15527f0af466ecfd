//! Bounded retry with exponential backoff around a single provider call.

use log::{debug, warn};
use std::time::Duration;

use crate::error::{LlmError, Result};
use crate::provider::{LlmProvider, LlmRequest, LlmResponse};

/// Configuration for retry behavior.
///
/// A call is attempted once, then retried up to `max_retries` more times.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total number of attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after the given delay, capped at `max_delay`
    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f32(
            (delay.as_secs_f32() * self.backoff_factor).min(self.max_delay.as_secs_f32()),
        )
    }

    /// How long to wait before retrying `error`. A server-supplied
    /// `retry_after` lengthens the wait, still capped at `max_delay`.
    fn wait_for(&self, error: &LlmError, delay: Duration) -> Duration {
        match error {
            LlmError::RateLimited {
                retry_after: Some(secs),
            } => delay.max(Duration::from_secs(*secs)).min(self.max_delay),
            _ => delay,
        }
    }
}

/// Execute a completion, retrying retryable failures with backoff.
///
/// Non-retryable errors are returned immediately. Once the attempts are used
/// up the last error is wrapped in [`LlmError::RetriesExhausted`].
pub async fn complete_with_retry(
    provider: &dyn LlmProvider,
    request: &LlmRequest,
    policy: &RetryPolicy,
) -> Result<LlmResponse> {
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;
        debug!(
            "Calling {} (attempt {}/{})",
            provider.name(),
            attempt,
            policy.max_attempts()
        );

        match provider.complete(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if attempt >= policy.max_attempts() {
                    return Err(LlmError::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }

                let wait = policy.wait_for(&e, delay);
                warn!(
                    "{} request failed (attempt {}/{}): {}. Retrying in {:?}",
                    provider.name(),
                    attempt,
                    policy.max_attempts(),
                    e,
                    wait
                );

                tokio::time::sleep(wait).await;
                delay = policy.next_delay(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_factor: 2.0,
        }
    }

    fn overloaded() -> LlmError {
        LlmError::ServerOverloaded {
            message: "overloaded".to_string(),
        }
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        let mut delay = policy.initial_delay;
        for _ in 0..10 {
            delay = policy.next_delay(delay);
        }
        assert_eq!(delay, policy.max_delay);
    }

    #[test]
    fn test_retry_after_lengthens_wait() {
        let policy = fast_policy(1);
        let limited = LlmError::RateLimited {
            retry_after: Some(60),
        };
        assert_eq!(
            policy.wait_for(&limited, Duration::from_millis(1)),
            policy.max_delay
        );
        assert_eq!(
            policy.wait_for(&overloaded(), Duration::from_millis(1)),
            Duration::from_millis(1)
        );
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let provider = MockProvider::fails_then_succeeds(2, overloaded(), "ok");
        let request = LlmRequest::new("test");

        let response = complete_with_retry(&provider, &request, &fast_policy(3))
            .await
            .unwrap();

        assert_eq!(response.content, "ok");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausts_retries() {
        let provider = MockProvider::always_fails(overloaded());
        let request = LlmRequest::new("test");

        let err = complete_with_retry(&provider, &request, &fast_policy(2))
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let provider = MockProvider::always_fails(LlmError::ConfigError("bad".into()));
        let request = LlmRequest::new("test");

        let err = complete_with_retry(&provider, &request, &fast_policy(5))
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::ConfigError(_)));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_retry_policy_makes_one_attempt() {
        let provider = MockProvider::always_fails(overloaded());
        let request = LlmRequest::new("test");

        let err = complete_with_retry(&provider, &request, &RetryPolicy::none())
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(provider.call_count(), 1);
    }
}
