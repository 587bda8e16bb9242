//! Retry with exponential backoff for non-streaming calls.
//!
//! Only buffered request/response calls go through the policy. A streaming
//! transfer may already have produced caller-visible events, so those paths
//! are wired with [`RetryConfig::no_retries`] and degrade in-stream instead.

use std::future::Future;
use std::time::Duration;
use tracing::instrument;

use crate::errors::WidnError;

/// Backoff parameters for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the initial call.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling on the computed delay.
    pub max_delay: Duration,
    /// Growth factor applied per attempt.
    pub multiplier: f64,
    /// Whether to randomize delays to avoid synchronized retries.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of retries.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the initial delay.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the multiplier.
    pub fn multiplier(mut self, mult: f64) -> Self {
        self.multiplier = mult;
        self
    }

    /// Sets whether to use jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Configuration that performs the initial call only.
    ///
    /// Used to wire services whose failures must not be replayed, such as
    /// streaming dispatch.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

/// Executes fallible async operations, replaying retryable failures with
/// exponentially growing delays.
///
/// Only [`WidnError::is_retryable`] failures are replayed; validation and
/// authentication errors return immediately. A rate-limit error carrying an
/// upstream `retry-after` overrides the computed backoff for that attempt.
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a new retry policy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Creates a retry policy with default configuration.
    pub fn default_policy() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Runs `operation`, replaying it on retryable failure until it succeeds
    /// or the attempt budget is spent. Returns the last error on exhaustion.
    #[instrument(skip(self, operation), fields(max_retries = self.config.max_retries))]
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, WidnError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, WidnError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.config.max_retries {
                        return Err(err);
                    }

                    let delay = self.backoff_delay(attempt, &err);

                    tracing::info!(
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "Retrying after error"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Delay before retry number `attempt + 1`.
    fn backoff_delay(&self, attempt: u32, error: &WidnError) -> Duration {
        // An upstream-provided retry-after always wins.
        if let Some(retry_after) = error.retry_after() {
            return retry_after;
        }

        let exponential = self.config.initial_delay.as_millis() as f64
            * self.config.multiplier.powi(attempt as i32);
        let capped = exponential.min(self.config.max_delay.as_millis() as f64);

        let delay_ms = match self.config.jitter {
            // Stretch by a random 0-25% so concurrent clients spread out.
            true => capped * (1.0 + rand::random::<f64>() * 0.25),
            false => capped,
        };

        Duration::from_millis(delay_ms as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::default_policy()
    }
}
