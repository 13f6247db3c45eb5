//! Classification of HTTP failures into retryable and final ones.

use reqwest::StatusCode;
use thiserror::Error;

/// Attempts made for one request before giving up.
pub const MAX_RETRIES: usize = 3;

/// Default pause between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// A response that will not improve by asking again.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NonRetryableError {
    #[error("rate limit exceeded (HTTP {0}), try again later or set GITHUB_TOKEN")]
    RateLimited(u16),
    #[error("authentication failed (HTTP 401), check GITHUB_TOKEN")]
    Unauthorized,
    #[error("access forbidden (HTTP 403)")]
    Forbidden,
    #[error("not found (HTTP 404)")]
    NotFound,
    #[error("request rejected (HTTP {0})")]
    Rejected(u16),
}

/// Classify a status code. `None` means the request may be retried.
pub fn classify_status(status: StatusCode) -> Option<NonRetryableError> {
    match status {
        StatusCode::UNAUTHORIZED => Some(NonRetryableError::Unauthorized),
        StatusCode::FORBIDDEN => Some(NonRetryableError::Forbidden),
        StatusCode::NOT_FOUND => Some(NonRetryableError::NotFound),
        StatusCode::TOO_MANY_REQUESTS => Some(NonRetryableError::RateLimited(status.as_u16())),
        s if s.is_client_error() => Some(NonRetryableError::Rejected(s.as_u16())),
        _ => None,
    }
}

/// Convert an `error_for_status` failure, marking final ones as [`NonRetryableError`].
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    let non_retryable = error.status().and_then(classify_status);
    match non_retryable {
        // GitHub reports an exhausted quota as 403 with a rate-limit message
        Some(NonRetryableError::Forbidden) if error.to_string().contains("rate limit") => {
            anyhow::Error::from(NonRetryableError::RateLimited(403))
        }
        Some(e) => anyhow::Error::from(e),
        None => anyhow::Error::from(error),
    }
}

/// Whether a failed attempt is worth another try.
pub fn is_retryable(error: &anyhow::Error) -> bool {
    error.downcast_ref::<NonRetryableError>().is_none()
}
