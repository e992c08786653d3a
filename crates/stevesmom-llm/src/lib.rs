//! Steve's Mom LLM - Provider abstraction, resilience and routing
//!
//! This crate provides the provider-facing half of the Steve's Mom core:
//! - Router: Provider trait definition and policy-driven routing with fallback
//! - Resilience: Token bucket, backoff, circuit breaker, error normalization
//!   and the composed rate limiter
//! - Message and completion types shared with the context manager
//!
//! No concrete provider wire protocol lives here. Providers are plugged in
//! through [`LlmProvider`] and resolved at startup by a [`ProviderResolver`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod error;
pub mod message;
pub mod resilience;
pub mod router;

pub use completion::{CompletionResponse, GenerationConfig, TextStream, TokenUsage, ToolCall};
pub use error::{Error, ErrorKind, ProviderError, Result};
pub use message::{Message, MessageContent, MessageRole};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, ExponentialBackoff, RateLimiter,
    RateLimiterConfig, RateLimiterStats, TokenBucket,
};
pub use router::{
    create_router_from_env, Capability, HealthState, HealthStatus, LlmProvider, MockProvider,
    ModelRouter, ProviderConfig, ProviderConfigUpdate, ProviderResolver, ProviderStatus,
    ResolvedProvider, RouterConfiguration, RouterSettings, RouterSnapshot, RoutingPolicy,
    RoutingStrategy, StaticResolver,
};
