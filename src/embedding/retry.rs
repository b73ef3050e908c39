//! Exponential backoff around a flaky provider.

use super::EmbeddingProvider;
use crate::error::ProviderError;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (zero based), doubling each time and
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Provider wrapper that retries failed requests with exponential backoff.
/// The last error is returned once the retries are used up.
#[derive(Debug)]
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: EmbeddingProvider> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<P: EmbeddingProvider> EmbeddingProvider for RetryingProvider<P> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.inner.embed(text) {
                Ok(embedding) => return Ok(embedding),
                Err(e) if attempt >= self.policy.max_retries => return Err(e),
                Err(e) => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        "{} request failed (attempt {}): {}. Retrying in {:?}",
                        self.inner.name(),
                        attempt + 1,
                        e,
                        delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
