//! Shared HTTP helpers for provider clients.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use tracing::warn;

use crate::error::{ProviderError, ProviderResult};

/// Body substrings some providers use instead of a 429.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "too many requests",
    "throttled",
    "concurrency limit",
];

pub(crate) fn build_client(timeout: Duration) -> ProviderResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ProviderError::Network)
}

/// Pass 2xx responses through; turn everything else into a typed error
/// carrying the provider body verbatim.
pub(crate) async fn check_response(provider: &str, response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();

    warn!(
        provider = %provider,
        status = status.as_u16(),
        body = %body,
        "Provider returned an error response"
    );

    if status == StatusCode::TOO_MANY_REQUESTS || is_rate_limit_body(&body) {
        return Err(ProviderError::rate_limited(provider, retry_after, body));
    }

    Err(ProviderError::request(provider, status.as_u16(), body))
}

/// `Retry-After` in (possibly fractional) seconds.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

fn is_rate_limit_body(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}
