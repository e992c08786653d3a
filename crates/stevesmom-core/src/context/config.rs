//! Context manager configuration

use std::time::Duration;

use crate::error::{Error, Result};

/// Limits and timings of a [`ContextManager`](super::ContextManager)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Token budget of a context window when the caller gives none
    pub max_context_tokens: usize,
    /// Estimated session size above which summarization may run
    pub summarization_threshold: usize,
    /// Sessions kept per user before the least recently active is evicted
    pub max_sessions_per_user: usize,
    /// Inactivity after which a session expires
    pub session_max_age: Duration,
    /// Delay between cleanup runs
    pub cleanup_interval: Duration,
    /// Delay before retrying a failed cleanup run
    pub cleanup_retry_interval: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 4000,
            summarization_threshold: 3000,
            max_sessions_per_user: 10,
            session_max_age: Duration::from_secs(24 * 60 * 60),
            cleanup_interval: Duration::from_secs(60 * 60),
            cleanup_retry_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl ContextConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set default context window budget
    #[must_use]
    pub fn with_max_context_tokens(mut self, tokens: usize) -> Self {
        self.max_context_tokens = tokens;
        self
    }

    /// Set summarization threshold
    #[must_use]
    pub fn with_summarization_threshold(mut self, tokens: usize) -> Self {
        self.summarization_threshold = tokens;
        self
    }

    /// Set per-user session cap
    #[must_use]
    pub fn with_max_sessions_per_user(mut self, max: usize) -> Self {
        self.max_sessions_per_user = max;
        self
    }

    /// Set session expiry age
    #[must_use]
    pub fn with_session_max_age(mut self, age: Duration) -> Self {
        self.session_max_age = age;
        self
    }

    /// Set cleanup interval
    #[must_use]
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set cleanup retry interval
    #[must_use]
    pub fn with_cleanup_retry_interval(mut self, interval: Duration) -> Self {
        self.cleanup_retry_interval = interval;
        self
    }

    /// Check limits
    pub fn validate(&self) -> Result<()> {
        if self.max_sessions_per_user == 0 {
            return Err(Error::invalid_config(
                "max_sessions_per_user",
                "must be at least 1",
            ));
        }
        if self.max_context_tokens == 0 {
            return Err(Error::invalid_config(
                "max_context_tokens",
                "must be at least 1",
            ));
        }
        if self.cleanup_interval.is_zero() || self.cleanup_retry_interval.is_zero() {
            return Err(Error::invalid_config(
                "cleanup_interval",
                "cleanup intervals must be non-zero",
            ));
        }
        Ok(())
    }
}
