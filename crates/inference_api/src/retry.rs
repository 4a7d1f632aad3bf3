//! When a completion request may be sent again.
//!
//! Only failures that happen before the response body opens are candidates.
//! The inference server reports errors as
//! `{"error":{"code":503,"message":"Loading model","type":"unavailable_error"}}`;
//! the `type` is trusted over the HTTP status when present, because the
//! server also returns 500 for requests that will never succeed.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;
use serde_json::Value;

/// Default retry attempts after the first request.
pub const MAX_RETRIES: u32 = 2;

const BASE_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(8);

/// Error `type` values the server uses for conditions that clear on their own.
const TRANSIENT_ERROR_TYPES: &[&str] = &["unavailable_error", "rate_limit_error", "overloaded_error"];

/// Error `type` values for requests that will fail the same way every time.
const PERMANENT_ERROR_TYPES: &[&str] = &[
    "invalid_request_error",
    "authentication_error",
    "permission_error",
    "not_found_error",
    "not_supported_error",
    "exceed_context_size_error",
];

/// Messages from untyped errors (plain-text proxies, older servers) that still
/// mean "try again shortly".
fn transient_message_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)loading model|no slot available|server is busy|overloaded|rate.?limit")
            .expect("transient message regex must compile")
    })
}

/// Attempt budget and backoff for opening a completion stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_RETRIES)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: BASE_DELAY,
            max_delay: MAX_DELAY,
        }
    }

    /// Whether another request may follow the zero-based `attempt`.
    pub fn has_budget_after(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Pause before the request that follows `attempt`: doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Classify a non-success response by its status and error body.
pub fn is_transient_status(status: StatusCode, body: &str) -> bool {
    let error = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("error").cloned());

    if let Some(kind) = error
        .as_ref()
        .and_then(|error| error.get("type"))
        .and_then(Value::as_str)
    {
        if TRANSIENT_ERROR_TYPES.contains(&kind) {
            return true;
        }
        if PERMANENT_ERROR_TYPES.contains(&kind) {
            return false;
        }
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => true,
        _ => {
            let message = match &error {
                Some(Value::String(message)) => message.as_str(),
                Some(error) => error.get("message").and_then(Value::as_str).unwrap_or(body),
                None => body,
            };
            transient_message_regex().is_match(message)
        }
    }
}

/// Transport failures worth another attempt: the request never got an answer.
pub fn is_transient_request_error(error: &reqwest::Error) -> bool {
    !(error.is_builder() || error.is_redirect() || error.is_status() || error.is_decode())
}
