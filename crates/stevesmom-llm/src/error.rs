//! Error types for stevesmom-llm
//!
//! Provider failures are carried as [`ProviderError`] values. Whether a failure
//! may be retried is a property of the value itself, never something a catch
//! site has to guess.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed taxonomy of provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Admission denied locally or by the provider
    RateLimit,
    /// The call did not complete in time
    Timeout,
    /// Service unavailable or rejected by a circuit breaker
    Unavailable,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Stable error code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimit => "RATE_LIMIT",
            Self::Timeout => "TIMEOUT",
            Self::Unavailable => "UNAVAILABLE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether errors of this kind are retriable unless stated otherwise
    #[must_use]
    pub fn default_retriable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Timeout)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A normalized provider failure
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("[{provider}] {}: {message}", .kind.code())]
pub struct ProviderError {
    /// Failure class
    pub kind: ErrorKind,
    /// Provider the failure is attributed to
    pub provider: String,
    /// Human-readable message
    pub message: String,
    /// Whether retrying the same provider may succeed
    pub retriable: bool,
}

impl ProviderError {
    /// Create an error with the kind's default retriability
    #[must_use]
    pub fn new(kind: ErrorKind, provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider: provider.into(),
            message: message.into(),
            retriable: kind.default_retriable(),
        }
    }

    /// Rate limit error (retriable)
    #[must_use]
    pub fn rate_limit(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimit, provider, message)
    }

    /// Timeout error (retriable)
    #[must_use]
    pub fn timeout(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, provider, message)
    }

    /// Unavailable error (non-retriable)
    #[must_use]
    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, provider, message)
    }

    /// Unknown error (non-retriable)
    #[must_use]
    pub fn unknown(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, provider, message)
    }

    /// Override retriability
    #[must_use]
    pub fn with_retriable(mut self, retriable: bool) -> Self {
        self.retriable = retriable;
        self
    }

    /// Error code of this failure
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

/// LLM error type
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Failure raised by (or attributed to) a provider
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// API error with an unclassified message
    #[error("api error: {0}")]
    Api(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// No provider registered under this name
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// No registered provider passed the eligibility checks
    #[error("no eligible providers for model {model}")]
    NoEligibleProviders {
        /// Requested model
        model: String,
    },

    /// Every eligible provider failed without leaving an error behind
    #[error("all providers failed")]
    AllProvidersFailed,

    /// Invalid configuration value
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Offending field
        field: String,
        /// Detailed message
        message: String,
    },

    /// Invalid routing policy
    #[error("invalid routing policy: {0}")]
    InvalidPolicy(String),
}

impl Error {
    /// Build an [`Error::InvalidConfig`]
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same operation may succeed
    ///
    /// Follows the error normalizer, so both always agree.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        crate::resilience::normalize_error(self, "").retriable
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
