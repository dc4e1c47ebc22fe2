//! Resilience patterns for the data client
//!
//! - Retry with exponential backoff (`retry`)
//! - Circuit breaker (`circuit_breaker`)
//! - `Resilience`, which composes the two in a fixed order: the breaker is
//!   outermost, so one logical call counts as one breaker outcome no matter
//!   how many attempts the retry loop made.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics};
pub use retry::{BackoffSchedule, RetryConfig, RetryExecutor};

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;

/// Breaker-around-retry composition for one destination
#[derive(Clone)]
pub struct Resilience {
    /// Retry executor
    retry: RetryExecutor,

    /// Circuit breaker, shared by clones of the owning client
    circuit_breaker: Arc<CircuitBreaker>,
}

impl Resilience {
    /// Create a new resilience facade with specified configurations
    pub fn new(
        name: impl Into<String>,
        retry_config: RetryConfig,
        circuit_breaker_config: CircuitBreakerConfig,
    ) -> Self {
        Self {
            retry: RetryExecutor::new(retry_config),
            circuit_breaker: Arc::new(CircuitBreaker::new(name, circuit_breaker_config)),
        }
    }

    /// Run `operation` as `with_breaker(with_retry(operation))`
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.circuit_breaker
            .call(|| self.retry.execute(operation))
            .await
    }

    /// Get the current status of the circuit breaker
    pub fn circuit_breaker_status(&self) -> CircuitBreakerStatus {
        self.circuit_breaker.status()
    }

    /// Breaker counters for dashboards and tests
    pub fn circuit_breaker_metrics(&self) -> CircuitBreakerMetrics {
        self.circuit_breaker.metrics()
    }

    /// The retry configuration in force
    pub fn retry_config(&self) -> &RetryConfig {
        self.retry.config()
    }
}

/// Status of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerStatus {
    /// Circuit is closed, allowing requests
    Closed,

    /// Circuit is open, rejecting requests
    Open,

    /// Recovery timeout elapsed; the next call probes the destination
    HalfOpen,
}

impl std::fmt::Display for CircuitBreakerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}
