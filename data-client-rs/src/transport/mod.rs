//! Transport layer
//!
//! One network exchange per call to [`HttpTransport::send`]: no retries, no
//! error translation. Every non-2xx status still comes back as `Ok`; only
//! failures to obtain a response (timeout, connection, I/O) are errors.

pub mod http;

pub use self::http::ReqwestTransport;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use url::Url;

use crate::context::RequestContext;
use crate::error::Result;

/// A single outbound attempt
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,

    /// Absolute URL, query string included
    pub url: Url,

    /// Complete header set, correlation headers included
    pub headers: HeaderMap,

    /// Serialized JSON body
    pub body: Option<Vec<u8>>,

    /// Deadline for this attempt only
    pub timeout: Duration,

    /// One-based attempt number within the logical call
    pub attempt: u32,

    /// Correlation identifiers, for logging
    pub context: RequestContext,
}

/// A fully received response
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Status code
    pub status: StatusCode,

    /// Response headers
    pub headers: HeaderMap,

    /// Body bytes, possibly empty
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Build a response from parts
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Minimal asynchronous I/O primitive used by the client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one exchange, enforcing `request.timeout`
    async fn send(&self, request: TransportRequest) -> Result<RawResponse>;
}
