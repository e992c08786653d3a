//! Composed rate limiter
//!
//! One logical call goes through token bucket admission, then up to
//! `max_retries` breaker-guarded attempts with exponential backoff between
//! them. Every failure leaving this module is a normalized [`ProviderError`].

use serde::Serialize;
use std::future::Future;
use tracing::{debug, warn};

use super::{
    normalize_error, CircuitBreaker, CircuitBreakerConfig, CircuitState, ExponentialBackoff,
    TokenBucket,
};
use crate::error::{ProviderError, Result};

/// Configuration for a [`RateLimiter`]
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Token bucket capacity
    pub capacity: f64,
    /// Token bucket refill rate in tokens per second
    pub refill_rate: f64,
    /// Total attempts per logical call
    pub max_retries: u32,
    /// Delay schedule between attempts
    pub backoff: ExponentialBackoff,
    /// Breaker settings
    pub breaker: CircuitBreakerConfig,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 10.0,
            refill_rate: 1.0,
            max_retries: 3,
            backoff: ExponentialBackoff::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl RateLimiterConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bucket capacity and refill rate
    #[must_use]
    pub fn with_bucket(mut self, capacity: f64, refill_rate: f64) -> Self {
        self.capacity = capacity;
        self.refill_rate = refill_rate;
        self
    }

    /// Set total attempts per call
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set backoff schedule
    #[must_use]
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set breaker settings
    #[must_use]
    pub fn with_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }
}

/// Point-in-time view of a limiter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimiterStats {
    /// Provider name
    pub provider: String,
    /// Tokens currently in the bucket
    pub tokens_available: f64,
    /// Bucket capacity
    pub capacity: f64,
    /// Tokens per second
    pub refill_rate: f64,
    /// Breaker state
    pub circuit_state: CircuitState,
    /// Breaker failure count
    pub failure_count: u32,
    /// Total attempts per call
    pub max_retries: u32,
}

/// Per-provider admission, retry and breaker wrapper
#[derive(Debug)]
pub struct RateLimiter {
    provider: String,
    bucket: TokenBucket,
    backoff: ExponentialBackoff,
    breaker: CircuitBreaker,
    max_retries: u32,
}

impl RateLimiter {
    /// Create a limiter for `provider`
    #[must_use]
    pub fn new(provider: impl Into<String>, config: RateLimiterConfig) -> Self {
        let provider = provider.into();
        Self {
            bucket: TokenBucket::new(config.capacity, config.refill_rate),
            breaker: CircuitBreaker::new(provider.clone(), config.breaker),
            backoff: config.backoff,
            max_retries: config.max_retries,
            provider,
        }
    }

    /// Provider this limiter guards
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The underlying breaker
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run one logical call
    ///
    /// A bucket denial fails immediately with a rate limit error and `f` is
    /// not invoked. Otherwise `f` is retried while its normalized error is
    /// retriable and attempts remain.
    pub async fn execute<F, Fut, T>(&self, mut f: F) -> std::result::Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.bucket.consume(1.0) {
            debug!(provider = %self.provider, "Local rate limit exceeded");
            return Err(ProviderError::rate_limit(
                &self.provider,
                "local rate limit exceeded",
            ));
        }

        let attempts = self.max_retries.max(1);
        let mut attempt = 0;
        loop {
            let error = match self.breaker.call(&mut f).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(provider = %self.provider, attempt = attempt, "Call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => normalize_error(&e, &self.provider),
            };

            if !error.retriable || attempt + 1 >= attempts {
                debug!(
                    provider = %self.provider,
                    attempt = attempt,
                    code = error.code(),
                    "Call failed, no more retries"
                );
                return Err(error);
            }

            warn!(
                provider = %self.provider,
                attempt = attempt,
                max_retries = attempts,
                error = %error,
                "Call failed, retrying"
            );
            self.backoff.wait(attempt).await;
            attempt += 1;
        }
    }

    /// Snapshot of bucket and breaker state
    #[must_use]
    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            provider: self.provider.clone(),
            tokens_available: self.bucket.available(),
            capacity: self.bucket.capacity(),
            refill_rate: self.bucket.refill_rate(),
            circuit_state: self.breaker.state(),
            failure_count: self.breaker.failure_count(),
            max_retries: self.max_retries,
        }
    }
}
