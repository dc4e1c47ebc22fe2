//! reqwest-backed transport with a shared keep-alive pool

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use tracing::{info, warn};

use crate::error::{Result, ServiceError};

use super::{HttpTransport, RawResponse, TransportRequest};

/// Connection pool settings
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Idle connections kept per host
    pub max_idle_per_host: usize,

    /// How long an idle connection is kept
    pub idle_timeout: Duration,

    /// TCP keep-alive interval
    pub tcp_keepalive: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 20,
            idle_timeout: Duration::from_secs(90),
            tcp_keepalive: Some(Duration::from_secs(60)),
        }
    }
}

/// Transport over a pooled `reqwest::Client`.
///
/// Cloning is cheap and clones share the pool. An attempt abandoned on
/// timeout drops its in-flight connection instead of returning it.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Wrap an already configured client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a pooled client
    pub fn build(pool: &PoolConfig, user_agent: &str, compression: bool) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| ServiceError::configuration(format!("Invalid user agent: {}", e)))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .pool_idle_timeout(pool.idle_timeout)
            .tcp_keepalive(pool.tcp_keepalive)
            .gzip(compression)
            .build()
            .map_err(|e| {
                ServiceError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self::new(client))
    }

    async fn exchange(&self, request: TransportRequest) -> Result<RawResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(RawResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse> {
        let method = request.method.clone();
        let url = request.url.clone();
        let attempt = request.attempt;
        let context = request.context.clone();
        let timeout = request.timeout;
        let start = Instant::now();

        let outcome = match tokio::time::timeout(timeout, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::timeout(format!(
                "{} {} exceeded {}ms",
                method,
                url,
                timeout.as_millis()
            ))),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match &outcome {
            Ok(response) => info!(
                method = %method,
                url = %url,
                status = response.status.as_u16(),
                duration_ms,
                attempt,
                request_id = %context.request_id(),
                correlation_id = %context.correlation_id(),
                "Data service call completed"
            ),
            Err(err) => warn!(
                method = %method,
                url = %url,
                duration_ms,
                attempt,
                request_id = %context.request_id(),
                correlation_id = %context.correlation_id(),
                error = %err,
                "Data service call failed"
            ),
        }

        outcome
    }
}
