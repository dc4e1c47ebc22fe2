//! Metrics collection for data-service calls
//!
//! `ClientMetrics` keeps in-process counters that tests and health endpoints
//! can read back, and mirrors every record into the `metrics` facade so an
//! installed exporter picks them up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use metrics::{counter, histogram};

use crate::core::{AttemptRecord, CallOutcome, CallRecord, Telemetry};
use crate::error::mapping::classify_status;

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub calls: u64,
    pub successes: u64,
    pub absences: u64,
    pub failures: u64,
    pub short_circuits: u64,
    pub attempts: u64,
    pub total_duration_ms: u64,
    pub status_counts: HashMap<u16, u64>,
}

impl MetricsSnapshot {
    /// Mean attempts per call, or 0.0 before the first call
    pub fn attempts_per_call(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.attempts as f64 / self.calls as f64
        }
    }
}

/// Counters for one client (or a group of clients sharing the sink)
#[derive(Debug, Default)]
pub struct ClientMetrics {
    calls: AtomicU64,
    successes: AtomicU64,
    absences: AtomicU64,
    failures: AtomicU64,
    short_circuits: AtomicU64,
    attempts: AtomicU64,
    total_duration_ms: AtomicU64,
    status_counts: Mutex<HashMap<u16, u64>>,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            absences: self.absences.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            short_circuits: self.short_circuits.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            total_duration_ms: self.total_duration_ms.load(Ordering::Relaxed),
            status_counts: self
                .status_counts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Flattened string view, for health and debug endpoints
    pub fn as_map(&self) -> HashMap<String, String> {
        let snapshot = self.snapshot();
        let mut map = HashMap::new();
        map.insert("calls".to_string(), snapshot.calls.to_string());
        map.insert("successes".to_string(), snapshot.successes.to_string());
        map.insert("absences".to_string(), snapshot.absences.to_string());
        map.insert("failures".to_string(), snapshot.failures.to_string());
        map.insert(
            "short_circuits".to_string(),
            snapshot.short_circuits.to_string(),
        );
        map.insert("attempts".to_string(), snapshot.attempts.to_string());
        map.insert(
            "attempts_per_call".to_string(),
            format!("{:.2}", snapshot.attempts_per_call()),
        );
        for (status, count) in &snapshot.status_counts {
            map.insert(format!("status_{}", status), count.to_string());
        }
        map
    }

    /// Zero every counter
    pub fn reset(&self) {
        for counter in [
            &self.calls,
            &self.successes,
            &self.absences,
            &self.failures,
            &self.short_circuits,
            &self.attempts,
            &self.total_duration_ms,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.status_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Telemetry for ClientMetrics {
    fn record_attempt(&self, attempt: &AttemptRecord<'_>) {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        if let Some(status) = attempt.status {
            *self
                .status_counts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(status)
                .or_insert(0) += 1;
        }

        counter!(
            "data_client_attempts_total",
            1,
            "service" => attempt.service.to_string(),
            "method" => attempt.method.to_string(),
            "status_class" => classify_status(attempt.status)
        );
    }

    fn record_call(&self, call: &CallRecord<'_>) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.total_duration_ms
            .fetch_add(call.duration.as_millis() as u64, Ordering::Relaxed);

        let bucket = match call.outcome {
            CallOutcome::Success => &self.successes,
            CallOutcome::Absent => &self.absences,
            CallOutcome::Failed => &self.failures,
            CallOutcome::ShortCircuited => &self.short_circuits,
        };
        bucket.fetch_add(1, Ordering::Relaxed);

        counter!(
            "data_client_calls_total",
            1,
            "service" => call.service.to_string(),
            "outcome" => call.outcome.as_str(),
            "status_class" => classify_status(call.status)
        );
        histogram!(
            "data_client_call_duration_seconds",
            call.duration.as_secs_f64(),
            "service" => call.service.to_string()
        );
    }
}
