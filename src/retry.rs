use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How the exponential delay is randomized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// Use the exponential delay as-is
    None,
    /// Pick uniformly between `min_delay` and the exponential delay
    Full,
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,
    /// Base delay before the first retry
    pub initial_delay: Duration,
    /// Floor for any delay between retries
    pub min_delay: Duration,
    /// Ceiling for any delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles the delay each time)
    pub backoff_multiplier: f64,
    pub jitter: Jitter,
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            min_delay: Duration::ZERO,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: Jitter::None,
        }
    }

    /// Set the minimum delay between retries
    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Set the maximum delay between retries
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Preset: completion requests (3 attempts, randomized 1s..40s backoff)
    pub fn completion() -> Self {
        Self::new(3, Duration::from_secs(1))
            .with_min_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(40))
            .with_backoff_multiplier(2.0)
            .with_jitter(Jitter::Full)
    }

    /// Exponential delay for a given attempt number (0-indexed), clamped to
    /// `[min_delay, max_delay]`, before jitter
    fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        let delay = Duration::from_millis(delay_ms as u64);
        delay.max(self.min_delay).min(self.max_delay)
    }

    /// Delay to wait before `attempt`, drawing any jitter from `rng`
    pub fn delay_for_attempt<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay_for_attempt(attempt);
        if base.is_zero() {
            return base;
        }

        match self.jitter {
            Jitter::None => base,
            Jitter::Full => {
                let low = self.min_delay.min(base).as_millis() as u64;
                let high = base.as_millis() as u64;
                Duration::from_millis(rng.random_range(low..=high))
            }
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::completion()
    }
}

/// Execute an async operation with retries, using a predicate to determine if retry is appropriate
///
/// Errors for which `should_retry` returns false are returned immediately.
/// A `max_attempts` of 0 is treated as 1.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        // Wait before retry (except for first attempt)
        let delay = config.delay_for_attempt(attempt, &mut rand::rng());
        if !delay.is_zero() {
            debug!(
                "{}: Retry attempt {}/{} after {:?}",
                operation_name,
                attempt + 1,
                max_attempts,
                delay
            );
            sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        "{}: Succeeded on attempt {}/{}",
                        operation_name,
                        attempt + 1,
                        max_attempts
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if !should_retry(&e) {
                    debug!(
                        "{}: Error is not retryable, failing immediately: {}",
                        operation_name, e
                    );
                    return Err(e);
                }

                let remaining = max_attempts - attempt - 1;
                if remaining == 0 {
                    warn!(
                        "{}: All {} attempts failed. Last error: {}",
                        operation_name, max_attempts, e
                    );
                    return Err(e);
                }

                warn!(
                    "{}: Attempt {}/{} failed ({}), {} retries remaining",
                    operation_name,
                    attempt + 1,
                    max_attempts,
                    e,
                    remaining
                );
                attempt += 1;
            }
        }
    }
}
