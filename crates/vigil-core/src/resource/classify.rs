//! Mapping of transport, HTTP, JSON-RPC and SQL failures onto [`ResilienceError`].

use regex::Regex;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::sync::OnceLock;
use std::time::Duration;
use vigil_types::ResilienceError;

/// JSON-RPC error codes providers use for "limit exceeded".
const RATE_LIMIT_RPC_CODES: &[i64] = &[-32005, -32029, 429];

static RETRY_AFTER_REGEX: OnceLock<Regex> = OnceLock::new();
static RATE_LIMIT_MESSAGE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_retry_after_regex() -> &'static Regex {
    RETRY_AFTER_REGEX.get_or_init(|| {
        Regex::new(r"(?i)(?:retry|try again)\s+(?:after|in)\s+(\d+(?:\.\d+)?)\s*(ms|s|sec|second)")
            .expect("Retry after regex is valid")
    })
}

fn get_rate_limit_message_regex() -> &'static Regex {
    RATE_LIMIT_MESSAGE_REGEX.get_or_init(|| {
        Regex::new(r"(?i)rate[\s_-]?limit|too many requests|limit exceeded|request limit reached")
            .expect("Rate limit message regex is valid")
    })
}

/// Extract a retry hint in milliseconds from free text ("retry after 3s", "try again in 500ms").
pub fn parse_retry_after(message: &str) -> Option<u64> {
    let caps = get_retry_after_regex().captures(message)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let ms = match caps.get(2)?.as_str().to_ascii_lowercase().as_str() {
        "ms" => value,
        _ => value * 1000.0,
    };
    Some(ms.round() as u64)
}

/// `Retry-After` header in delta-seconds form. HTTP-date values are ignored.
pub fn retry_after_header(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(|secs| secs.saturating_mul(1000))
}

pub fn is_rate_limit_message(message: &str) -> bool {
    get_rate_limit_message_regex().is_match(message)
}

/// Classify a non-success HTTP response.
pub fn from_status(resource_id: &str, status: StatusCode, headers: &HeaderMap, body: &str) -> ResilienceError {
    let message = truncate(body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = retry_after_header(headers).or_else(|| parse_retry_after(body));
        return ResilienceError::rate_limited(resource_id, retry_after, format!("HTTP 429: {message}"));
    }
    ResilienceError::upstream_status(resource_id, i64::from(status.as_u16()), message)
}

/// Classify a transport-level failure.
pub fn from_reqwest(resource_id: &str, error: &reqwest::Error, timeout: Duration) -> ResilienceError {
    if error.is_timeout() {
        return ResilienceError::timeout(resource_id, timeout);
    }
    if let Some(status) = error.status() {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return ResilienceError::rate_limited(resource_id, None, error.to_string());
        }
        return ResilienceError::upstream_status(resource_id, i64::from(status.as_u16()), error.to_string());
    }
    if error.is_decode() {
        return ResilienceError::upstream(resource_id, format!("Malformed response: {error}"));
    }
    ResilienceError::upstream(resource_id, error.to_string())
}

/// Classify a JSON-RPC `error` object.
pub fn from_rpc_error(resource_id: &str, code: i64, message: &str) -> ResilienceError {
    if RATE_LIMIT_RPC_CODES.contains(&code) || is_rate_limit_message(message) {
        return ResilienceError::rate_limited(
            resource_id,
            parse_retry_after(message),
            format!("RPC error {code}: {message}"),
        );
    }
    ResilienceError::upstream_status(resource_id, code, message)
}

/// Classify a database failure.
pub fn from_sqlx(resource_id: &str, error: &sqlx::Error, timeout: Duration) -> ResilienceError {
    match error {
        sqlx::Error::PoolTimedOut => ResilienceError::timeout(resource_id, timeout),
        sqlx::Error::Database(db) if db.code().as_deref() == Some("57014") => {
            // query_canceled: statement_timeout fired
            ResilienceError::timeout(resource_id, timeout)
        },
        other => ResilienceError::upstream(resource_id, other.to_string()),
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 256;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
