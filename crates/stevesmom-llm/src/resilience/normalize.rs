//! Error normalization
//!
//! Maps whatever a provider raised onto the closed [`ErrorKind`] taxonomy.
//! Classification is a case-insensitive substring match over the error text,
//! checked in table order: rate limit, then timeout, then unavailable.

use crate::error::{Error, ErrorKind, ProviderError};

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit",
    "too many requests",
    "quota exceeded",
    "throttled",
    "429",
];

const TIMEOUT_PATTERNS: &[&str] = &["timeout", "timed out"];

const UNAVAILABLE_PATTERNS: &[&str] = &[
    "service unavailable",
    "server error",
    "internal server error",
    "bad gateway",
    "circuit breaker is open",
    "502",
    "503",
    "504",
];

/// Classify an error message
#[must_use]
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if matches(RATE_LIMIT_PATTERNS) {
        ErrorKind::RateLimit
    } else if matches(TIMEOUT_PATTERNS) {
        ErrorKind::Timeout
    } else if matches(UNAVAILABLE_PATTERNS) {
        ErrorKind::Unavailable
    } else {
        ErrorKind::Unknown
    }
}

/// Normalize a crate error attributed to `provider`
///
/// Errors that are already a [`ProviderError`] pass through unchanged.
#[must_use]
pub fn normalize_error(error: &Error, provider: &str) -> ProviderError {
    match error {
        Error::Provider(e) => e.clone(),
        Error::Timeout(_) => ProviderError::timeout(provider, error.to_string()),
        other => {
            let message = other.to_string();
            ProviderError::new(classify_message(&message), provider, message)
        }
    }
}

/// Normalize an arbitrary error attributed to `provider`
///
/// Recognizes crate errors, Tokio timeouts and I/O timeouts by type before
/// falling back to message classification.
#[must_use]
pub fn normalize_dyn_error(
    error: &(dyn std::error::Error + 'static),
    provider: &str,
) -> ProviderError {
    if let Some(e) = error.downcast_ref::<ProviderError>() {
        return e.clone();
    }
    if let Some(e) = error.downcast_ref::<Error>() {
        return normalize_error(e, provider);
    }
    if error.is::<tokio::time::error::Elapsed>() {
        return ProviderError::timeout(provider, error.to_string());
    }
    if let Some(e) = error.downcast_ref::<std::io::Error>() {
        if e.kind() == std::io::ErrorKind::TimedOut {
            return ProviderError::timeout(provider, e.to_string());
        }
    }

    let message = error.to_string();
    ProviderError::new(classify_message(&message), provider, message)
}
