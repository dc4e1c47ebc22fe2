//! Request assembly and response mapping for `DataServiceClient`

use std::str::FromStr;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::context::RequestContext;
use crate::error::mapping::translate;
use crate::error::problem::MAX_RAW_BODY_CHARS;
use crate::error::{Result, ServiceError};
use crate::transport::RawResponse;
use crate::util::truncate_string;

/// Per-call options: extra headers, query parameters and a JSON body
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub(crate) headers: HeaderMap,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<Vec<u8>>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header. `X-Request-ID` and `X-Correlation-ID` are always
    /// replaced by the call's `RequestContext`.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Serialize `body` as the JSON request body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let bytes = serde_json::to_vec(body).map_err(|e| {
            ServiceError::parsing(format!("Failed to serialize request body: {}", e))
        })?;
        self.body = Some(bytes);
        Ok(self)
    }

    /// Whether a body will be sent
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

/// Parse a header pair, reporting bad input as a configuration error
pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_str(name)
        .map_err(|e| ServiceError::configuration(format!("Invalid header name {}: {}", name, e)))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| {
        ServiceError::configuration(format!("Invalid header value for {}: {}", name, e))
    })?;
    Ok((header_name, header_value))
}

/// Resolve `path` below `base`, keeping any path prefix of the base URL
pub(crate) fn build_url(base: &Url, path: &str, query: &[(String, String)]) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let mut url = Url::parse(&joined)
        .map_err(|e| ServiceError::configuration(format!("Invalid request path {}: {}", path, e)))?;

    if !query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    Ok(url)
}

/// Outbound header set: client defaults, then per-call headers, then the
/// correlation headers, which always win.
pub(crate) fn build_headers(
    defaults: &HeaderMap,
    per_call: &HeaderMap,
    ctx: &RequestContext,
    has_body: bool,
) -> Result<HeaderMap> {
    let mut headers = defaults.clone();
    for (name, value) in per_call {
        headers.insert(name.clone(), value.clone());
    }

    ctx.apply_to(&mut headers)?;

    if has_body {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

    Ok(headers)
}

/// What a finished exchange means for the caller.
///
/// [`DataServiceClient::get`](crate::DataServiceClient::get) and friends
/// collapse `Empty` and `Absent` into `None`; use
/// [`DataServiceClient::exchange`](crate::DataServiceClient::exchange) to
/// tell them apart.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<R> {
    /// 2xx with a decoded body
    Value(R),

    /// 204, or 2xx without a body
    Empty,

    /// 404 on a read
    Absent,
}

impl<R> Reply<R> {
    /// The decoded value, if there was one
    pub fn into_option(self) -> Option<R> {
        match self {
            Reply::Value(value) => Some(value),
            Reply::Empty | Reply::Absent => None,
        }
    }

    /// True for a 404 on a read
    pub fn is_absent(&self) -> bool {
        matches!(self, Reply::Absent)
    }
}

/// Map a final response onto a reply or a typed error.
///
/// `decode` only runs for a 2xx that carries a body.
pub(crate) fn map_response<R, D>(
    response: &RawResponse,
    absent_on_not_found: bool,
    decode: D,
) -> Result<Reply<R>>
where
    D: FnOnce(&RawResponse) -> Result<R>,
{
    let status = response.status;

    if status == StatusCode::NOT_FOUND && absent_on_not_found {
        return Ok(Reply::Absent);
    }

    if !status.is_success() {
        return Err(translate(status, &response.body));
    }

    if status == StatusCode::NO_CONTENT || response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Reply::Empty);
    }

    decode(response).map(Reply::Value)
}

/// Decode a success body as JSON
pub(crate) fn decode_json<R: DeserializeOwned>(response: &RawResponse) -> Result<R> {
    serde_json::from_slice(&response.body).map_err(|e| {
        let raw = String::from_utf8_lossy(&response.body);
        ServiceError::parsing(format!(
            "Failed to decode {} response: {} (body: {})",
            response.status.as_u16(),
            e,
            truncate_string(&raw, MAX_RAW_BODY_CHARS)
        ))
    })
}
