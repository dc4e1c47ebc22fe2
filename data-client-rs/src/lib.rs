//! # Data Client
//!
//! Resilient, correlation-aware HTTP client used by business-logic services
//! to call internal data services.
//!
//! This crate provides:
//!
//! - `DataServiceClient`: typed GET/POST/PUT/PATCH/DELETE over JSON
//! - Retry with capped exponential backoff for transient failures
//! - A per-client circuit breaker
//! - Problem-Details error translation into `ServiceError`
//! - `RequestContext` propagation through `X-Request-ID` / `X-Correlation-ID`
//! - Configuration loading, structured logging and metrics hooks
//!
//! ## Architecture
//!
//! A call flows `DataServiceClient` → `CircuitBreaker` → `RetryExecutor` →
//! `HttpTransport`, and the final response (or error) flows back through
//! the error translator before reaching the caller.

pub mod client;
pub use client::{DataServiceClient, Reply, RequestOptions};

pub mod core;
pub use self::core::{CallOutcome, ClientBuilder, ServiceClient, Telemetry};

pub mod context;
pub use context::RequestContext;

pub mod error;
pub use error::{ErrorContext, Result, ServiceError};

pub mod resilience;
pub use resilience::{CircuitBreaker, CircuitBreakerStatus, Resilience, RetryConfig, RetryExecutor};

pub mod config;
pub use config::{ConfigProvider, DataClientConfig, ServiceConfig};

pub mod transport;
pub use transport::{HttpTransport, RawResponse, TransportRequest};

pub mod telemetry;
pub use telemetry::ClientMetrics;

pub mod logging;

pub mod util;

#[cfg(test)]
mod tests;

/// Create a new default client builder
pub fn client() -> ClientBuilder {
    ClientBuilder::new()
}
