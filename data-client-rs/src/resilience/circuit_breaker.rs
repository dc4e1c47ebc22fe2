//! Circuit breaker implementation for preventing cascading failures
//!
//! ```text
//! Closed --(failures >= threshold)--> Open --(recovery timeout)--> HalfOpen
//! HalfOpen --(success)--> Closed
//! HalfOpen --(failure)--> Open
//! ```
//!
//! State lives behind a single mutex so the failure counter and the state
//! transition always change together. The lock is never held across an
//! `.await`.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{Result, ServiceError};

use super::CircuitBreakerStatus;

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// How long the circuit stays open before a probe call is allowed
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    status: CircuitBreakerStatus,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    total_failures: u64,
    total_successes: u64,
    total_rejections: u64,
}

/// A thread-safe circuit breaker guarding one destination
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the specified configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState {
                status: CircuitBreakerStatus::Closed,
                failure_count: 0,
                last_failure_time: None,
                total_failures: 0,
                total_successes: 0,
                total_rejections: 0,
            }),
        }
    }

    /// Run `operation` under breaker protection.
    ///
    /// An open circuit fails with `ServiceUnavailable` without invoking the
    /// operation. Transient failures count towards the threshold and are
    /// returned unchanged; permanent errors are returned without being
    /// counted either way.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.check()?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                if err.is_retryable() {
                    self.record_failure();
                }
                Err(err)
            }
        }
    }

    /// Get the current circuit status
    pub fn status(&self) -> CircuitBreakerStatus {
        self.lock().status
    }

    /// Get the current number of consecutive failures
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Name of the destination this breaker guards
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get metrics about the circuit breaker
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.lock();
        CircuitBreakerMetrics {
            status: state.status,
            failure_count: state.failure_count,
            total_failures: state.total_failures,
            total_successes: state.total_successes,
            total_rejections: state.total_rejections,
            since_last_failure: state.last_failure_time.map(|at| at.elapsed()),
            config: self.config.clone(),
        }
    }

    // Private methods

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit or reject a call, moving Open to HalfOpen once the recovery
    /// timeout has elapsed.
    fn check(&self) -> Result<()> {
        let mut state = self.lock();

        if state.status != CircuitBreakerStatus::Open {
            return Ok(());
        }

        let elapsed = state
            .last_failure_time
            .map(|at| at.elapsed())
            .unwrap_or(self.config.recovery_timeout);

        if elapsed >= self.config.recovery_timeout {
            info!(breaker = %self.name, "Circuit breaker transitioning to HalfOpen");
            state.status = CircuitBreakerStatus::HalfOpen;
            return Ok(());
        }

        state.total_rejections += 1;
        let remaining = self.config.recovery_timeout.saturating_sub(elapsed);
        Err(ServiceError::circuit_open(format!(
            "Circuit breaker for {} is open, rejecting calls for another {}ms",
            self.name,
            remaining.as_millis()
        )))
    }

    fn record_success(&self) {
        let mut state = self.lock();
        state.total_successes += 1;
        state.failure_count = 0;

        if state.status != CircuitBreakerStatus::Closed {
            info!(breaker = %self.name, "Circuit breaker transitioning to Closed");
            state.status = CircuitBreakerStatus::Closed;
        }
    }

    fn record_failure(&self) {
        let mut state = self.lock();
        state.total_failures += 1;
        state.failure_count = state.failure_count.saturating_add(1);

        if state.failure_count >= self.config.failure_threshold {
            if state.status != CircuitBreakerStatus::Open {
                warn!(
                    breaker = %self.name,
                    failures = state.failure_count,
                    "Circuit breaker transitioning to Open"
                );
            }
            state.status = CircuitBreakerStatus::Open;
            state.last_failure_time = Some(Instant::now());
        }
    }
}

/// Metrics for a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    /// Current status
    pub status: CircuitBreakerStatus,

    /// Current consecutive failure count
    pub failure_count: u32,

    /// Total failures seen
    pub total_failures: u64,

    /// Total successes seen
    pub total_successes: u64,

    /// Calls rejected while open
    pub total_rejections: u64,

    /// Time since the failure that (re)opened the circuit
    pub since_last_failure: Option<Duration>,

    /// Current configuration
    pub config: CircuitBreakerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, recovery: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: recovery,
            },
        )
    }

    #[test]
    fn test_circuit_closed_initially() {
        let cb = breaker(3, Duration::from_secs(30));
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert!(cb.check().is_ok());
    }

    #[test]
    fn test_circuit_opens_at_threshold() {
        let cb = breaker(3, Duration::from_secs(30));

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);

        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        let err = cb.check().unwrap_err();
        assert!(matches!(err, ServiceError::ServiceUnavailable(_)));
        assert_eq!(cb.metrics().total_rejections, 1);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(30));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);

        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
    }

    #[test]
    fn test_half_open_after_recovery_timeout() {
        let cb = breaker(1, Duration::from_millis(50));
        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        std::thread::sleep(Duration::from_millis(80));

        assert!(cb.check().is_ok());
        assert_eq!(cb.status(), CircuitBreakerStatus::HalfOpen);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(2, Duration::from_millis(50));
        cb.record_failure();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(80));
        cb.check().unwrap();

        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);
        assert!(cb.check().is_err());
    }

    #[test]
    fn test_half_open_success_closes() {
        let cb = breaker(1, Duration::from_millis(50));
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(80));
        cb.check().unwrap();

        cb.record_success();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test]
    async fn test_call_skips_operation_when_open() {
        let cb = breaker(1, Duration::from_secs(30));
        let _ = cb
            .call(|| async { Err::<(), _>(ServiceError::timeout("slow")) })
            .await;

        let mut invoked = false;
        let result = cb
            .call(|| {
                invoked = true;
                async { Ok(()) }
            })
            .await;

        assert!(result.is_err());
        assert!(!invoked);
    }

    #[tokio::test]
    async fn test_call_ignores_permanent_errors() {
        let cb = breaker(1, Duration::from_secs(30));
        let result: Result<()> = cb
            .call(|| async { Err(ServiceError::configuration("bad")) })
            .await;

        assert!(result.is_err());
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.failure_count(), 0);
    }
}
