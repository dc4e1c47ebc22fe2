//! Error handling for the data client
//!
//! This module provides the error taxonomy callers see:
//! - Transport failures (`Timeout`, `Network`), which are retried
//! - Status-bearing failures translated from downstream responses
//! - Context (service, endpoint, correlation ids, attempts) attached by the client
//! - A convenient Result type alias

use serde_json::{Map, Value};
use thiserror::Error;

pub mod mapping;
pub mod problem;

pub use problem::{ErrorResponse, ProblemDetails};

/// Result type for data client operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Main error type for the data client
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Connection or I/O failure before a response was received
    #[error("Network error: {0}")]
    Network(String),

    /// The per-attempt deadline expired
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Destination failing (5xx, 429) or short-circuited by an open breaker
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(ErrorResponse),

    /// 404 on a non-read operation
    #[error("Not found: {0}")]
    NotFound(ErrorResponse),

    /// 422 with a Problem-Details body
    #[error("Validation error: {0}")]
    Validation(ErrorResponse),

    /// 409 with a Problem-Details body
    #[error("Conflict: {0}")]
    Conflict(ErrorResponse),

    /// Any other client error, or an error body that is not Problem-Details
    #[error("Client error: {0}")]
    GenericClient(ErrorResponse),

    /// A success body that does not decode into the requested type
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Invalid construction parameters, URLs or header values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Errors with additional context
    #[error("{inner}")]
    WithContext {
        inner: Box<ServiceError>,
        context: ErrorContext,
    },
}

impl ServiceError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        ServiceError::Network(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        ServiceError::Timeout(message.into())
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        ServiceError::Parsing(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ServiceError::Configuration(message.into())
    }

    /// The error raised instead of calling a destination whose breaker is open
    pub fn circuit_open(message: impl Into<String>) -> Self {
        ServiceError::ServiceUnavailable(ErrorResponse::message_only(message))
    }

    /// Add context to an existing error
    pub fn with_context(self, context: ErrorContext) -> Self {
        ServiceError::WithContext {
            inner: Box::new(self),
            context,
        }
    }

    /// The innermost error, with every context layer stripped
    pub fn root(&self) -> &ServiceError {
        match self {
            ServiceError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// The outermost attached context, if any
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ServiceError::WithContext { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The response payload for status-bearing variants
    pub fn response(&self) -> Option<&ErrorResponse> {
        match self.root() {
            ServiceError::ServiceUnavailable(r)
            | ServiceError::NotFound(r)
            | ServiceError::Validation(r)
            | ServiceError::Conflict(r)
            | ServiceError::GenericClient(r) => Some(r),
            _ => None,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ServiceError::WithContext { inner, context } => {
                inner.status_code().or(context.status_code)
            }
            _ => self.response().and_then(|r| r.status),
        }
    }

    /// The parsed Problem-Details `detail`, if the downstream sent one
    pub fn detail(&self) -> Option<&str> {
        self.response().and_then(ErrorResponse::detail)
    }

    /// The parsed Problem-Details `errors` map, if the downstream sent one
    pub fn errors(&self) -> Option<&Map<String, Value>> {
        self.response().and_then(ErrorResponse::errors)
    }

    /// Get the service name if available
    pub fn service_name(&self) -> Option<&str> {
        self.context().map(|c| c.service.as_str())
    }

    /// Request id of the call that failed, if the client attached one
    pub fn request_id(&self) -> Option<&str> {
        self.context().and_then(|c| c.request_id.as_deref())
    }

    /// Correlation id of the call that failed, if the client attached one
    pub fn correlation_id(&self) -> Option<&str> {
        self.context().and_then(|c| c.correlation_id.as_deref())
    }

    /// Number of transport attempts made before this error was raised
    pub fn attempts(&self) -> Option<u32> {
        self.context().and_then(|c| c.attempts)
    }

    /// Check if this is a transient failure worth another attempt.
    ///
    /// Timeouts and connection failures always are. Otherwise the HTTP status
    /// decides (5xx and 429), whichever variant the body translated into.
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            ServiceError::Network(_) | ServiceError::Timeout(_) => true,
            _ => self
                .status_code()
                .map(mapping::is_retryable_status)
                .unwrap_or(false),
        }
    }

    /// Check if this is a permanent error (not retryable)
    pub fn is_permanent(&self) -> bool {
        !self.is_retryable()
    }

    /// Short machine-readable category, used for logs and metrics labels
    pub fn kind(&self) -> &'static str {
        match self.root() {
            ServiceError::Network(_) => "network",
            ServiceError::Timeout(_) => "timeout",
            ServiceError::ServiceUnavailable(_) => "service_unavailable",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Validation(_) => "validation",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::GenericClient(_) => "client_error",
            ServiceError::Parsing(_) => "parsing",
            ServiceError::Configuration(_) => "configuration",
            ServiceError::WithContext { .. } => "unknown",
        }
    }
}

/// Error context information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Service that generated the error
    pub service: String,

    /// When the error was raised
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,

    /// HTTP status code if applicable
    pub status_code: Option<u16>,

    /// Request ID for tracing
    pub request_id: Option<String>,

    /// Correlation ID shared by the whole call chain
    pub correlation_id: Option<String>,

    /// Endpoint that was called, as `METHOD path`
    pub endpoint: Option<String>,

    /// Transport attempts made
    pub attempts: Option<u32>,

}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            service: "unknown".to_string(),
            timestamp: Some(chrono::Utc::now()),
            status_code: None,
            request_id: None,
            correlation_id: None,
            endpoint: None,
            attempts: None,
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new error context for a specific service
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Add an HTTP status code
    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Add a request ID
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Add a correlation ID
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add an endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Record how many attempts were made
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }
}

/// Convert reqwest errors to ServiceError
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ServiceError::network(format!("Connection error: {}", err))
        } else if err.is_builder() {
            ServiceError::configuration(format!("Invalid request: {}", err))
        } else if err.is_redirect() {
            ServiceError::network(format!("Too many redirects: {}", err))
        } else if err.is_decode() {
            ServiceError::parsing(format!("Response decode error: {}", err))
        } else {
            ServiceError::network(format!("HTTP client error: {}", err))
        }
    }
}

/// Convert serde_json errors to ServiceError
impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::parsing(format!("JSON error: {}", err))
    }
}
