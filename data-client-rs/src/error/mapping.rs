//! Error translation for data-service responses
//!
//! Maps a non-success status plus its body onto the `ServiceError` taxonomy.
//! Pure: no I/O, no retries, no logging.

use reqwest::StatusCode;

use super::problem::{ErrorResponse, ProblemDetails};
use super::ServiceError;

/// Translate a failed response into a typed error.
///
/// Bodies matching the Problem-Details envelope are classified by status.
/// Any other body degrades to `GenericClient` with a truncated raw message,
/// except from a failing destination (5xx, 429), which stays
/// `ServiceUnavailable` so exhausted retries surface uniformly.
pub fn translate(status: StatusCode, body: &[u8]) -> ServiceError {
    let Some(problem) = ProblemDetails::parse(body) else {
        let response = ErrorResponse::from_raw(status, body);
        return if is_retryable_status(status.as_u16()) {
            ServiceError::ServiceUnavailable(response)
        } else {
            ServiceError::GenericClient(response)
        };
    };

    let response = ErrorResponse::from_problem(status, problem);
    match status {
        StatusCode::NOT_FOUND => ServiceError::NotFound(response),
        StatusCode::CONFLICT => ServiceError::Conflict(response),
        StatusCode::UNPROCESSABLE_ENTITY => ServiceError::Validation(response),
        StatusCode::TOO_MANY_REQUESTS => ServiceError::ServiceUnavailable(response),
        s if s.as_u16() >= 500 => ServiceError::ServiceUnavailable(response),
        _ => ServiceError::GenericClient(response),
    }
}

/// Coarse status class, used as a low-cardinality metrics label.
/// `None` means the attempt never got a response.
pub fn classify_status(status: Option<u16>) -> &'static str {
    let Some(status) = status else {
        return "transport";
    };
    match status {
        200..=299 => "success",
        404 => "not_found",
        409 => "conflict",
        422 => "validation",
        429 => "rate_limit",
        500..=599 => "server",
        400..=499 => "client",
        _ => "unknown",
    }
}

/// Determine if an HTTP status code indicates a transient failure.
///
/// 5xx and 429 only; every other 4xx fails on first occurrence.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}
