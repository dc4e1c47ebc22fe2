//! Retry with exponential backoff for transient errors
//!
//! The delay before retry `n` (zero-based) is
//! `min(base_delay * backoff_factor^n, max_delay)`. With a factor of at
//! least 1.0 the sequence never decreases and never exceeds `max_delay`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use tracing::{debug, warn};

use crate::error::{Result, ServiceError};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 means no retries)
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Multiplier applied per retry; values below 1.0 are treated as 1.0
    pub backoff_factor: f64,

    /// Cap on any single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryConfig {{ max_retries: {}, base_delay: {:?}, backoff_factor: {}, max_delay: {:?} }}",
            self.max_retries, self.base_delay, self.backoff_factor, self.max_delay
        )
    }
}

impl RetryConfig {
    /// Total attempts for one logical call: the initial one plus the retries
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after the failed attempt numbered `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0);
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let max_secs = self.max_delay.as_secs_f64();
        let secs = (self.base_delay.as_secs_f64() * factor.powi(exponent)).min(max_secs);

        // `as_secs_f64` rounds up near `Duration::MAX`, so the cap itself may
        // not convert back
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }
}

/// Delay sequence for a single logical call.
///
/// Created per call and dropped when the call ends, so concurrent calls never
/// share attempt state.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    config: RetryConfig,
    attempt: u32,
}

impl BackoffSchedule {
    /// Start a fresh schedule at attempt zero
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// How many delays have been handed out so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Backoff for BackoffSchedule {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempt >= self.config.max_retries {
            return None;
        }

        let delay = self.config.delay_for(self.attempt);
        self.attempt += 1;
        Some(delay)
    }
}

/// Executor for retry operations with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    /// Retry configuration
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor with the specified configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute a fallible operation, retrying transient failures.
    ///
    /// Attempts run strictly one after another. A permanent error is returned
    /// immediately; once the schedule is exhausted the last error is returned.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut schedule = BackoffSchedule::new(self.config.clone());

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.should_retry(&err) {
                return Err(err);
            }

            match schedule.next_backoff() {
                Some(delay) => {
                    warn!(
                        attempt = schedule.attempt(),
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    debug!(
                        attempts = self.config.max_attempts(),
                        error = %err,
                        "Retry attempts exhausted"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Determine if an error should be retried
    fn should_retry(&self, error: &ServiceError) -> bool {
        error.is_retryable()
    }

    /// Get the current retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
