//! Client builder implementation
//!
//! Collects construction parameters, validates them once and produces a
//! `DataServiceClient`. Everything is fixed at `build()` time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::client::request::parse_header;
use crate::client::DataServiceClient;
use crate::config::{DataClientConfig, ServiceConfig};
use crate::core::{NoopTelemetry, Telemetry};
use crate::error::{Result, ServiceError};
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::transport::http::PoolConfig;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Default `User-Agent` sent by every client
pub const DEFAULT_USER_AGENT: &str = concat!("data-client-rs/", env!("CARGO_PKG_VERSION"));

/// Builder for `DataServiceClient`
pub struct ClientBuilder {
    /// Logical name of the destination service
    service_name: Option<String>,

    /// Base URL for the service
    base_url: Option<String>,

    /// Custom headers to include with all requests
    custom_headers: HashMap<String, String>,

    /// Per-attempt timeout
    timeout: Duration,

    /// Retry configuration
    retry_config: RetryConfig,

    /// Circuit breaker configuration
    circuit_breaker_config: CircuitBreakerConfig,

    /// Connection pool configuration
    pool: PoolConfig,

    /// User agent
    user_agent: String,

    /// Enable response decompression
    compression: bool,

    /// Instrumentation sink
    telemetry: Option<Arc<dyn Telemetry>>,

    /// Transport override, mainly for tests
    transport: Option<Arc<dyn HttpTransport>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            service_name: None,
            base_url: None,
            custom_headers: HashMap::new(),
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
            circuit_breaker_config: CircuitBreakerConfig::default(),
            pool: PoolConfig::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            compression: true,
            telemetry: None,
            transport: None,
        }
    }
}

impl ClientBuilder {
    /// Create a new client builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration
    pub fn from_config(config: DataClientConfig) -> Self {
        Self {
            service_name: Some(config.service_name),
            base_url: Some(config.base_url),
            timeout: config.timeout,
            retry_config: config.retry,
            circuit_breaker_config: config.circuit_breaker,
            pool: config.pool,
            ..Self::default()
        }
    }

    /// Name of the destination, used in logs, metrics and error context
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Set the base URL for the service
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Add a header sent with every request (e.g. an opaque `Authorization`)
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(key.into(), value.into());
        self
    }

    /// Set the per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure retry behavior
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Configure circuit breaker
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker_config = config;
        self
    }

    /// Configure the connection pool
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable response decompression
    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Route attempt and call records to `telemetry`
    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Replace the pooled HTTP transport
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// The configuration `build()` would use, validated
    pub fn config(&self) -> Result<DataClientConfig> {
        let base_url = self
            .base_url
            .clone()
            .ok_or_else(|| ServiceError::configuration("Base URL is required"))?;
        let service_name = self
            .service_name
            .clone()
            .unwrap_or_else(|| "data".to_string());

        let config = DataClientConfig {
            service_name,
            base_url,
            timeout: self.timeout,
            retry: self.retry_config.clone(),
            circuit_breaker: self.circuit_breaker_config.clone(),
            pool: self.pool.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the default header set
    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.custom_headers {
            let (name, value) = parse_header(key, value)?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// Build a client with the configured settings
    pub fn build(self) -> Result<DataServiceClient> {
        let config = self.config()?;
        let headers = self.build_headers()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::build(
                &config.pool,
                &self.user_agent,
                self.compression,
            )?),
        };
        let telemetry = self
            .telemetry
            .unwrap_or_else(|| Arc::new(NoopTelemetry) as Arc<dyn Telemetry>);

        DataServiceClient::new(config, headers, transport, telemetry)
    }
}
