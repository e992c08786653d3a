//! Resilience primitives for provider calls
//!
//! - token_bucket: Local admission control with burst capacity
//! - backoff: Exponential backoff delay calculation
//! - circuit_breaker: Per-provider failure trip state machine
//! - normalize: Maps raw provider failures onto [`crate::error::ErrorKind`]
//! - rate_limiter: All of the above composed around a single call site
//!
//! The model router reuses the breaker and backoff types from here rather
//! than keeping its own copies.

mod backoff;
mod circuit_breaker;
mod normalize;
mod rate_limiter;
mod token_bucket;

pub use backoff::ExponentialBackoff;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use normalize::{classify_message, normalize_dyn_error, normalize_error};
pub use rate_limiter::{RateLimiter, RateLimiterConfig, RateLimiterStats};
pub use token_bucket::TokenBucket;
