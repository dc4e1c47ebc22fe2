//! Problem-Details error documents
//!
//! Data services report failures as `{type, title, status, detail, instance,
//! errors?}`. Decoding is strict: a body either has every required field with
//! the right JSON type, or it is treated as an unstructured payload.

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::util::truncate_string;

/// Longest raw body fragment kept in a generic error message
pub const MAX_RAW_BODY_CHARS: usize = 200;

/// Structured error document returned by a downstream service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type
    #[serde(rename = "type")]
    pub problem_type: String,

    /// Short, human-readable summary
    pub title: String,

    /// HTTP status as reported by the producer
    pub status: u16,

    /// Human-readable explanation specific to this occurrence
    pub detail: String,

    /// URI reference identifying this occurrence
    pub instance: String,

    /// Field-level errors, typically from request validation
    #[serde(default)]
    pub errors: Option<Map<String, Value>>,
}

impl ProblemDetails {
    /// Decode `body` as a Problem-Details document, or `None` if it is not one
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}

/// Payload shared by every status-bearing error variant
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    /// HTTP status observed on the wire, `None` when no response was received
    pub status: Option<u16>,

    /// Human-readable message
    pub message: String,

    /// Parsed error document, when the body matched the envelope
    pub problem: Option<ProblemDetails>,
}

impl ErrorResponse {
    /// Build from a parsed envelope; the message is the envelope's `detail`
    pub fn from_problem(status: StatusCode, problem: ProblemDetails) -> Self {
        Self {
            status: Some(status.as_u16()),
            message: problem.detail.clone(),
            problem: Some(problem),
        }
    }

    /// Build from an unstructured body, keeping at most
    /// [`MAX_RAW_BODY_CHARS`] characters of it
    pub fn from_raw(status: StatusCode, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        let message = if text.is_empty() {
            format!("Request failed with status {}", status.as_u16())
        } else {
            format!(
                "Request failed with status {}: {}",
                status.as_u16(),
                truncate_string(text, MAX_RAW_BODY_CHARS)
            )
        };

        Self {
            status: Some(status.as_u16()),
            message,
            problem: None,
        }
    }

    /// A failure with no HTTP exchange behind it
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            problem: None,
        }
    }

    /// The envelope's `detail`, if any
    pub fn detail(&self) -> Option<&str> {
        self.problem.as_ref().map(|p| p.detail.as_str())
    }

    /// The envelope's field errors, if any
    pub fn errors(&self) -> Option<&Map<String, Value>> {
        self.problem.as_ref().and_then(|p| p.errors.as_ref())
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}
