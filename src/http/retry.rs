//! Retry policy for network operations with error classification.

use reqwest::StatusCode;
use std::time::Duration;

/// Maximum number of attempts for network operations.
pub const MAX_RETRIES: usize = 3;

/// Delay before the second attempt; doubled for every further attempt.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Backoff before attempt `attempt + 1`, given that `attempt` (1-based) just failed.
pub fn backoff_delay(base: Duration, attempt: usize) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16) as u32;
    base.saturating_mul(2u32.saturating_pow(exponent))
}

/// Errors that should not be retried.
#[derive(Debug)]
pub enum NonRetryableError {
    /// Resource not found (HTTP 404 or 410)
    NotFound(String),
    /// Forbidden or unauthorized access (HTTP 401/403)
    Forbidden(String),
    /// Other client errors that won't succeed on retry
    ClientError(String),
}

impl std::fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonRetryableError::NotFound(msg) => write!(f, "Not found: {}", msg),
            NonRetryableError::Forbidden(msg) => write!(f, "Access forbidden: {}", msg),
            NonRetryableError::ClientError(msg) => write!(f, "Request error: {}", msg),
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// Classifies an HTTP status as retryable or non-retryable.
/// Returns Ok(()) if a request failing with this status may be retried.
pub fn classify_status(status: StatusCode, url: &str) -> Result<(), NonRetryableError> {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            Err(NonRetryableError::NotFound(url.to_string()))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(NonRetryableError::Forbidden(
            format!("{} answered HTTP {}", url, status.as_u16()),
        )),
        // Timeouts and rate limits are transient even though they are 4xx.
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => Ok(()),
        s if s.is_client_error() => Err(NonRetryableError::ClientError(format!(
            "{} answered HTTP {}",
            url,
            s.as_u16()
        ))),
        // 5xx server errors are retryable
        _ => Ok(()),
    }
}

/// Converts an error from `error_for_status()` into an `anyhow::Error`, turning
/// non-retryable statuses into a [`NonRetryableError`].
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "request".to_string());
    match error.status().map(|s| classify_status(s, &url)) {
        Some(Err(non_retryable)) => anyhow::Error::from(non_retryable),
        _ => anyhow::Error::from(error),
    }
}
