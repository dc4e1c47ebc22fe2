//! Typed client for internal data services
//!
//! `DataServiceClient` drives every call as
//! `breaker(retry(transport attempt))`, translates failures into
//! `ServiceError`, and decodes success bodies into the caller's type.
//! Clones share the connection pool, the circuit breaker and the telemetry
//! sink; separately built clients share nothing.

pub mod request;

pub use request::{Reply, RequestOptions};

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::DataClientConfig;
use crate::context::RequestContext;
use crate::core::{AttemptRecord, CallOutcome, CallRecord, ServiceClient, Telemetry};
use crate::error::mapping::{is_retryable_status, translate};
use crate::error::{ErrorContext, Result, ServiceError};
use crate::resilience::{CircuitBreakerMetrics, CircuitBreakerStatus, Resilience};
use crate::transport::{HttpTransport, RawResponse, TransportRequest};
use crate::util::{measure_time_async, sanitize_for_logging};

use self::request::{build_headers, build_url, decode_json, map_response};

/// Path probed by [`DataServiceClient::health_check`]
pub const HEALTH_PATH: &str = "/health";

#[derive(Serialize)]
struct BulkRequest<'a, T> {
    items: &'a [T],
}

/// Resilient, correlation-aware client for one data service
#[derive(Clone)]
pub struct DataServiceClient {
    config: DataClientConfig,
    base_url: Url,
    default_headers: HeaderMap,
    transport: Arc<dyn HttpTransport>,
    resilience: Resilience,
    telemetry: Arc<dyn Telemetry>,
}

impl std::fmt::Debug for DataServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataServiceClient")
            .field("service", &self.config.service_name)
            .field("base_url", &self.config.base_url)
            .field("circuit_breaker", &self.resilience.circuit_breaker_status())
            .finish()
    }
}

impl DataServiceClient {
    /// Assemble a client; use [`ClientBuilder`](crate::ClientBuilder) instead
    pub(crate) fn new(
        config: DataClientConfig,
        default_headers: HeaderMap,
        transport: Arc<dyn HttpTransport>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ServiceError::configuration(format!(
                "Invalid base URL for {}: {}",
                config.service_name, e
            ))
        })?;
        let resilience = Resilience::new(
            config.service_name.clone(),
            config.retry.clone(),
            config.circuit_breaker.clone(),
        );

        Ok(Self {
            config,
            base_url,
            default_headers,
            transport,
            resilience,
            telemetry,
        })
    }

    /// Fetch a resource; `Ok(None)` when the service answers 404.
    ///
    /// A 2xx without a body also yields `Ok(None)`. Use [`exchange`](Self::exchange)
    /// when the two must be told apart.
    pub async fn get<R>(&self, ctx: &RequestContext, path: &str) -> Result<Option<R>>
    where
        R: DeserializeOwned,
    {
        self.send(ctx, Method::GET, path, RequestOptions::new())
            .await
    }

    /// Fetch a resource with query parameters
    pub async fn get_with_params<R>(
        &self,
        ctx: &RequestContext,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<R>>
    where
        R: DeserializeOwned,
    {
        let options = params
            .iter()
            .fold(RequestOptions::new(), |options, (k, v)| options.query(*k, v));
        self.send(ctx, Method::GET, path, options).await
    }

    /// POST `body` as JSON
    pub async fn post<B, R>(&self, ctx: &RequestContext, path: &str, body: &B) -> Result<Option<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let options = RequestOptions::new().json(body)?;
        self.send(ctx, Method::POST, path, options).await
    }

    /// PUT `body` as JSON
    pub async fn put<B, R>(&self, ctx: &RequestContext, path: &str, body: &B) -> Result<Option<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let options = RequestOptions::new().json(body)?;
        self.send(ctx, Method::PUT, path, options).await
    }

    /// PATCH `body` as JSON
    pub async fn patch<B, R>(
        &self,
        ctx: &RequestContext,
        path: &str,
        body: &B,
    ) -> Result<Option<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let options = RequestOptions::new().json(body)?;
        self.send(ctx, Method::PATCH, path, options).await
    }

    /// DELETE a resource: `Ok(true)` if it was deleted, `Ok(false)` if the
    /// service answered 404. The response body is never decoded.
    pub async fn delete(&self, ctx: &RequestContext, path: &str) -> Result<bool> {
        let reply = self
            .execute(ctx, Method::DELETE, path, RequestOptions::new(), true, |_| Ok(()))
            .await?;
        Ok(!reply.is_absent())
    }

    /// POST `{"items": [...]}` to `{path}/bulk`
    pub async fn post_bulk<T, R>(
        &self,
        ctx: &RequestContext,
        path: &str,
        items: &[T],
    ) -> Result<Option<R>>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let bulk_path = format!("{}/bulk", path.trim_end_matches('/'));
        let options = RequestOptions::new().json(&BulkRequest { items })?;
        self.send(ctx, Method::POST, &bulk_path, options).await
    }

    /// Issue an arbitrary call. A 404 yields `Ok(None)` for GET and HEAD
    /// only; for every other method it raises `NotFound`.
    pub async fn send<R>(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<R>>
    where
        R: DeserializeOwned,
    {
        self.exchange(ctx, method, path, options)
            .await
            .map(Reply::into_option)
    }

    /// Like [`send`](Self::send), but keeps an empty success apart from a
    /// 404 on a read
    pub async fn exchange<R>(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Reply<R>>
    where
        R: DeserializeOwned,
    {
        let is_read = method == Method::GET || method == Method::HEAD;
        self.execute(ctx, method, path, options, is_read, decode_json::<R>)
            .await
    }

    /// Probe `GET /health` with a single attempt outside the breaker.
    ///
    /// Reports `Ok(false)` for any failure to get a 2xx, so callers can
    /// aggregate readiness across services.
    pub async fn health_check(&self, ctx: &RequestContext) -> Result<bool> {
        let url = build_url(&self.base_url, HEALTH_PATH, &[])?;
        let headers = build_headers(&self.default_headers, &HeaderMap::new(), ctx, false)?;

        let request = TransportRequest {
            method: Method::GET,
            url,
            headers,
            body: None,
            timeout: self.config.timeout,
            attempt: 1,
            context: ctx.clone(),
        };

        match self.transport.send(request).await {
            Ok(response) => Ok(response.status.is_success()),
            Err(err) => {
                warn!(
                    service = %self.config.service_name,
                    error = %err,
                    "Health check failed"
                );
                Ok(false)
            }
        }
    }

    /// Current breaker state for this client (and its clones)
    pub fn circuit_breaker_status(&self) -> CircuitBreakerStatus {
        self.resilience.circuit_breaker_status()
    }

    /// Breaker counters for this client (and its clones)
    pub fn circuit_breaker_metrics(&self) -> CircuitBreakerMetrics {
        self.resilience.circuit_breaker_metrics()
    }

    /// Configuration the client was built with
    pub fn config(&self) -> &DataClientConfig {
        &self.config
    }

    async fn execute<R, D>(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        options: RequestOptions,
        absent_on_not_found: bool,
        decode: D,
    ) -> Result<Reply<R>>
    where
        D: FnOnce(&RawResponse) -> Result<R>,
    {
        let endpoint = format!("{} {}", method, path);
        let url = build_url(&self.base_url, path, &options.query)
            .map_err(|e| self.attach_context(e, ctx, &endpoint, 0))?;
        let headers = build_headers(
            &self.default_headers,
            &options.headers,
            ctx,
            options.has_body(),
        )
        .map_err(|e| self.attach_context(e, ctx, &endpoint, 0))?;

        let service = self.config.service_name.as_str();
        let body = options.body;
        let mut attempts: u32 = 0;

        let (result, duration) = {
            let attempts = &mut attempts;
            let (method, url, headers, body) = (&method, &url, &headers, &body);

            measure_time_async(|| {
                self.resilience.execute(move || {
                    *attempts += 1;
                    let request = TransportRequest {
                        method: method.clone(),
                        url: url.clone(),
                        headers: headers.clone(),
                        body: body.clone(),
                        timeout: self.config.timeout,
                        attempt: *attempts,
                        context: ctx.clone(),
                    };
                    self.attempt(request, service, path)
                })
            })
            .await
        };

        let status = match &result {
            Ok(response) => Some(response.status.as_u16()),
            Err(err) => err.status_code(),
        };
        let reply =
            result.and_then(|response| map_response(&response, absent_on_not_found, decode));

        let outcome = match &reply {
            Ok(Reply::Absent) => CallOutcome::Absent,
            Ok(_) => CallOutcome::Success,
            Err(_) if attempts == 0 => CallOutcome::ShortCircuited,
            Err(_) => CallOutcome::Failed,
        };

        self.telemetry.record_call(&CallRecord {
            service,
            method: &method,
            path,
            attempts,
            status,
            duration,
            outcome,
            error_kind: reply.as_ref().err().map(ServiceError::kind),
            context: ctx,
        });

        match reply {
            Ok(reply) => {
                debug!(
                    service,
                    endpoint = %endpoint,
                    attempts,
                    duration_ms = duration.as_millis() as u64,
                    outcome = %outcome,
                    request_id = %ctx.request_id(),
                    correlation_id = %ctx.correlation_id(),
                    "Data service call finished"
                );
                Ok(reply)
            }
            Err(err) => {
                warn!(
                    service,
                    endpoint = %endpoint,
                    attempts,
                    duration_ms = duration.as_millis() as u64,
                    outcome = %outcome,
                    kind = err.kind(),
                    request_id = %ctx.request_id(),
                    correlation_id = %ctx.correlation_id(),
                    error = %sanitize_for_logging(&err.to_string()),
                    "Data service call failed"
                );
                Err(self.attach_context(err, ctx, &endpoint, attempts))
            }
        }
    }

    /// One transport attempt. Transient statuses become errors so the retry
    /// loop and the breaker see them; anything else is handed back for
    /// response mapping.
    async fn attempt(
        &self,
        request: TransportRequest,
        service: &str,
        path: &str,
    ) -> Result<RawResponse> {
        let attempt = request.attempt;
        let method = request.method.clone();
        let context = request.context.clone();
        let started = Instant::now();

        let outcome = self.transport.send(request).await;

        self.telemetry.record_attempt(&AttemptRecord {
            service,
            method: &method,
            path,
            attempt,
            status: outcome.as_ref().ok().map(|r| r.status.as_u16()),
            duration: started.elapsed(),
            context: &context,
        });

        let response = outcome?;
        if is_retryable_status(response.status.as_u16()) {
            return Err(translate(response.status, &response.body));
        }
        Ok(response)
    }

    fn attach_context(
        &self,
        err: ServiceError,
        ctx: &RequestContext,
        endpoint: &str,
        attempts: u32,
    ) -> ServiceError {
        let mut context = ErrorContext::for_service(&self.config.service_name)
            .endpoint(endpoint)
            .request_id(ctx.request_id())
            .correlation_id(ctx.correlation_id())
            .attempts(attempts);
        if let Some(status) = err.status_code() {
            context = context.status_code(status);
        }
        err.with_context(context)
    }
}

#[async_trait]
impl ServiceClient for DataServiceClient {
    fn name(&self) -> &str {
        &self.config.service_name
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn health_check(&self, ctx: &RequestContext) -> Result<bool> {
        DataServiceClient::health_check(self, ctx).await
    }
}
