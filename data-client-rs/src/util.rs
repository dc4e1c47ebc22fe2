//! Utility module for common functionality
//!
//! Small helpers shared by the transport, the error translator and the
//! configuration loader.

use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;

/// Patterns scrubbed from anything that ends up in a log line.
/// Error messages can echo downstream bodies, which sometimes quote
/// credentials or connection strings.
static SENSITIVE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)bearer\s+[A-Za-z0-9\-_\.=]+", "Bearer [REDACTED]"),
        (r"(?i)(token|api[_-]?key)([\x22']?\s*[=:]\s*[\x22']?)[^\s&\x22',]+", "$1$2[REDACTED]"),
        (r"(?i)(password|secret)([\x22']?\s*[=:]\s*[\x22']?)[^\s&\x22',]+", "$1$2[REDACTED]"),
        (r"://([^:/@\s]+):[^@/\s]+@", "://$1:[REDACTED]@"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Async timing helper: runs the future produced by `f` and returns its
/// output together with the elapsed wall time.
pub async fn measure_time_async<F, T, Fut>(f: F) -> (T, Duration)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let result = f().await;
    (result, start.elapsed())
}

/// Truncate a string to at most `max_len` characters, adding an ellipsis if
/// anything was cut. Counts characters, so multi-byte input never splits.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }

    if max_len <= 3 {
        return s.chars().take(max_len).collect();
    }

    let mut truncated: String = s.chars().take(max_len - 3).collect();
    truncated.push_str("...");
    truncated
}

/// Redact credentials before a message is logged
pub fn sanitize_for_logging(s: &str) -> String {
    SENSITIVE_PATTERNS
        .iter()
        .fold(s.to_string(), |text, (re, replacement)| {
            re.replace_all(&text, *replacement).into_owned()
        })
}

/// Fresh random identifier for request and correlation ids
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Parse a duration from a string (e.g., "250ms", "30s", "5m", "1h").
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim().to_lowercase();

    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
