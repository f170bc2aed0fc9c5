//! Retry with exponential backoff and jitter, shared by the LLM client and
//! the hook dispatcher.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps the exponential growth).
    pub max_delay: Duration,
    /// Base for exponential backoff (typically 2.0).
    pub exponential_base: f64,
}

impl RetryConfig {
    /// Build a retry configuration.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        exponential_base: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            exponential_base,
        }
    }

    /// No retries: a single attempt only.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_base: 2.0,
        }
    }

    /// Defaults used for LLM provider requests.
    #[must_use]
    pub fn llm() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(20), 2.0)
    }

    /// Defaults used for hook subprocess retries (transient failures only).
    #[must_use]
    pub fn hook() -> Self {
        Self::new(2, Duration::from_millis(200), Duration::from_secs(5), 2.0)
    }

    /// The un-jittered delay for a given attempt number (1-indexed; attempt
    /// 0 always returns zero).
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base_ms = self.initial_delay.as_millis() as f64 * self.exponential_base.powi(exponent);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms.max(0.0) as u64)
    }

    /// Whether another attempt is allowed given the count already made.
    #[must_use]
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::llm()
    }
}

/// Apply uniform jitter in `[0.5x, 1.5x]` to a base delay, so that many
/// clients backing off at once do not retry in lockstep.
fn jittered(base: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.5..=1.5);
    Duration::from_millis((base.as_millis() as f64 * factor) as u64)
}

/// The result of a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// The operation eventually succeeded.
    Success {
        /// The successful value.
        value: T,
        /// Total attempts made, including the successful one.
        attempts: u32,
    },
    /// The operation failed on every attempt (or was not retryable).
    Exhausted {
        /// The final error.
        error: E,
        /// Total attempts made.
        attempts: u32,
    },
}

impl<T, E> RetryOutcome<T, E> {
    /// Collapse into a plain `Result`, discarding the attempt count.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::Exhausted { error, .. } => Err(error),
        }
    }
}

/// Run `operation` with exponential backoff and jitter, retrying only while
/// `should_retry` returns true for the error and the config still allows it.
///
/// `operation` receives the 0-indexed attempt number it is being called for.
pub async fn retry<T, E, Fut, F, P>(config: &RetryConfig, mut operation: F, should_retry: P) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                return RetryOutcome::Success {
                    value,
                    attempts: attempt + 1,
                };
            }
            Err(error) => {
                if !config.should_retry(attempt) || !should_retry(&error) {
                    return RetryOutcome::Exhausted {
                        error,
                        attempts: attempt + 1,
                    };
                }
                attempt += 1;
                let delay = jittered(config.delay_for_attempt(attempt));
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let config = RetryConfig::new(5, Duration::from_millis(100), Duration::from_millis(500), 2.0);
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(5), Duration::from_millis(500));
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let config = RetryConfig::new(3, Duration::from_millis(1), Duration::from_millis(10), 2.0);
        assert!(config.should_retry(0));
        assert!(config.should_retry(2));
        assert!(!config.should_retry(3));
    }

    #[test]
    fn no_retry_never_retries() {
        assert!(!RetryConfig::no_retry().should_retry(0));
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let config = RetryConfig::new(3, Duration::from_millis(1), Duration::from_millis(5), 2.0);
        let outcome = retry(&config, |_| async { Ok::<_, String>("ok") }, |_| true).await;
        assert_eq!(outcome, RetryOutcome::Success { value: "ok", attempts: 1 });
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let config = RetryConfig::new(5, Duration::from_millis(1), Duration::from_millis(5), 2.0);
        let outcome = retry(
            &config,
            |attempt| async move {
                if attempt < 2 {
                    Err("transient")
                } else {
                    Ok("recovered")
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(outcome, RetryOutcome::Success { value: "recovered", attempts: 3 });
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let config = RetryConfig::new(2, Duration::from_millis(1), Duration::from_millis(5), 2.0);
        let outcome = retry(&config, |_| async { Err::<(), _>("always") }, |_| true).await;
        assert_eq!(outcome, RetryOutcome::Exhausted { error: "always", attempts: 3 });
    }

    #[tokio::test]
    async fn aborts_immediately_on_non_retryable_error() {
        let config = RetryConfig::new(5, Duration::from_millis(1), Duration::from_millis(5), 2.0);
        let outcome = retry(&config, |_| async { Err::<(), _>("permanent") }, |_| false).await;
        assert_eq!(outcome, RetryOutcome::Exhausted { error: "permanent", attempts: 1 });
    }
}
