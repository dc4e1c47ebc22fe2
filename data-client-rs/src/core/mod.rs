//! Core abstractions for the data client
//!
//! - `ServiceClient`: identity and health of a downstream data service
//! - `Telemetry`: instrumentation hook fed by every attempt and every call
//! - `ClientBuilder`: builder pattern for creating clients

pub mod builder;
pub use builder::ClientBuilder;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;

use crate::context::RequestContext;
use crate::error::Result;

/// Base trait for downstream service clients
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// The client name/identifier
    fn name(&self) -> &str;

    /// The base URL for the service
    fn base_url(&self) -> &str;

    /// Probe the service; `Ok(false)` when it answers but is unhealthy or
    /// unreachable
    async fn health_check(&self, ctx: &RequestContext) -> Result<bool>;
}

/// Outcome of one logical call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// A value (or an empty success) was returned
    Success,

    /// A read found nothing (404 mapped to `None`)
    Absent,

    /// An error was raised after at least one attempt
    Failed,

    /// Rejected by an open circuit breaker, no attempt made
    ShortCircuited,
}

impl CallOutcome {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Absent => "absent",
            CallOutcome::Failed => "failed",
            CallOutcome::ShortCircuited => "short_circuited",
        }
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transport attempt, reported before the retry loop decides what's next
#[derive(Debug, Clone)]
pub struct AttemptRecord<'a> {
    pub service: &'a str,
    pub method: &'a Method,
    pub path: &'a str,
    pub attempt: u32,
    pub status: Option<u16>,
    pub duration: Duration,
    pub context: &'a RequestContext,
}

/// One logical call, reported once it has finished
#[derive(Debug, Clone)]
pub struct CallRecord<'a> {
    pub service: &'a str,
    pub method: &'a Method,
    pub path: &'a str,
    pub attempts: u32,
    pub status: Option<u16>,
    pub duration: Duration,
    pub outcome: CallOutcome,
    pub error_kind: Option<&'static str>,
    pub context: &'a RequestContext,
}

/// Instrumentation hook
pub trait Telemetry: Send + Sync {
    /// Record a finished transport attempt
    fn record_attempt(&self, attempt: &AttemptRecord<'_>);

    /// Record a finished logical call
    fn record_call(&self, call: &CallRecord<'_>);
}

/// Telemetry sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn record_attempt(&self, _attempt: &AttemptRecord<'_>) {}

    fn record_call(&self, _call: &CallRecord<'_>) {}
}
