//! Request correlation context
//!
//! A `RequestContext` is created once at the first service boundary that
//! receives an external call and is then passed, unchanged, into every
//! outbound call made while handling that request. Nothing in this crate
//! regenerates or mutates it.

use std::fmt;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{Result, ServiceError};
use crate::util::generate_request_id;

/// Header carrying the per-request identifier
pub const X_REQUEST_ID: &str = "X-Request-ID";

/// Header carrying the end-to-end correlation identifier
pub const X_CORRELATION_ID: &str = "X-Correlation-ID";

/// Correlation identifiers for one logical end-to-end request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestContext {
    request_id: String,
    correlation_id: String,
}

impl RequestContext {
    /// Build a context from known identifiers
    pub fn new(request_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            correlation_id: correlation_id.into(),
        }
    }

    /// Start a new call chain with freshly generated identifiers
    pub fn generate() -> Self {
        Self::new(generate_request_id(), generate_request_id())
    }

    /// Start a new call chain whose request id carries a service prefix,
    /// e.g. `data-2f1c...`
    pub fn generate_with_prefix(prefix: &str) -> Self {
        Self::new(
            format!("{}-{}", prefix, generate_request_id()),
            generate_request_id(),
        )
    }

    /// Re-establish the context from inbound headers.
    ///
    /// Values present on the inbound request are reused verbatim; missing or
    /// non-UTF-8 values are replaced by generated ones.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            request_id: read(X_REQUEST_ID).unwrap_or_else(generate_request_id),
            correlation_id: read(X_CORRELATION_ID).unwrap_or_else(generate_request_id),
        }
    }

    /// The per-request identifier
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The end-to-end correlation identifier
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Header name/value pairs, for collaborators such as message publishers
    /// that need to carry the same identifiers.
    pub fn header_pairs(&self) -> [(&'static str, &str); 2] {
        [
            (X_REQUEST_ID, self.request_id.as_str()),
            (X_CORRELATION_ID, self.correlation_id.as_str()),
        ]
    }

    /// Write both correlation headers into `headers`, replacing any value
    /// already present under those names.
    pub fn apply_to(&self, headers: &mut HeaderMap) -> Result<()> {
        for (name, value) in self.header_pairs() {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ServiceError::configuration(format!("Invalid header name {}: {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ServiceError::configuration(format!("Invalid {} value: {}", name, e))
            })?;
            headers.insert(header_name, value);
        }
        Ok(())
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "request_id={} correlation_id={}",
            self.request_id, self.correlation_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_headers_reuses_inbound_values() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-7"));
        headers.insert("x-correlation-id", HeaderValue::from_static("corr-42"));

        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.request_id(), "req-7");
        assert_eq!(ctx.correlation_id(), "corr-42");
    }

    #[test]
    fn test_from_headers_generates_missing_values() {
        let ctx = RequestContext::from_headers(&HeaderMap::new());
        assert!(!ctx.request_id().is_empty());
        assert!(!ctx.correlation_id().is_empty());

        // Cloned contexts keep the generated ids stable down the chain
        let downstream = ctx.clone();
        assert_eq!(downstream.correlation_id(), ctx.correlation_id());
    }

    #[test]
    fn test_generate_with_prefix() {
        let ctx = RequestContext::generate_with_prefix("data");
        assert!(ctx.request_id().starts_with("data-"));
    }

    #[test]
    fn test_apply_to_overwrites_existing_values() {
        let ctx = RequestContext::new("req-1", "corr-1");
        let mut headers = HeaderMap::new();
        headers.insert("x-correlation-id", HeaderValue::from_static("spoofed"));

        ctx.apply_to(&mut headers).unwrap();
        assert_eq!(headers.get("x-correlation-id").unwrap(), "corr-1");
        assert_eq!(headers.get("x-request-id").unwrap(), "req-1");
    }

    #[test]
    fn test_apply_to_rejects_invalid_header_values() {
        let ctx = RequestContext::new("bad\nid", "corr-1");
        let mut headers = HeaderMap::new();
        assert!(ctx.apply_to(&mut headers).is_err());
    }
}
