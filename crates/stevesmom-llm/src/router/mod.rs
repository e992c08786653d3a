//! Router - Provider abstraction and policy-driven routing
//!
//! This module defines the provider contract and the [`ModelRouter`] that
//! selects providers per request.
//!
//! ## Routing
//!
//! For every request the router:
//! - **Filters** providers: enabled, declares the required capabilities,
//!   lists the requested model, fits the cost thresholds
//! - **Orders** them by the policy's strategy, preferred providers first
//! - **Tries** them one by one, skipping open breakers and providers over
//!   their per-minute limit, and retries whole passes with backoff
//!
//! # Module Structure
//!
//! - `types`: Capabilities and health reporting
//! - `policy`: Routing strategy and policy
//! - `config`: Provider configuration, updates and snapshots
//! - `provider`: LlmProvider trait definition
//! - `state`: Per-provider runtime bookkeeping
//! - `strategy`: Candidate ordering
//! - `mock`: Mock provider for testing
//! - `env`: Construction from environment settings
//! - `router_impl`: ModelRouter implementation

mod config;
mod env;
mod mock;
mod policy;
mod provider;
mod router_impl;
mod state;
mod strategy;
mod types;

#[cfg(test)]
mod tests;

pub use config::{ProviderConfig, ProviderConfigUpdate, RouterConfiguration, RouterSnapshot};
pub use env::{
    create_router_from_env, ProviderResolver, ResolvedProvider, RouterSettings, StaticResolver,
    ENV_MAX_COST_THRESHOLD, ENV_MAX_LATENCY_MS, ENV_RETRY_ATTEMPTS, ENV_ROUTING_STRATEGY,
};
pub use mock::MockProvider;
pub use policy::{RoutingPolicy, RoutingStrategy};
pub use provider::LlmProvider;
pub use router_impl::{ModelRouter, ProviderStatus, DEFAULT_BREAKER_RECOVERY};
pub use types::{Capability, HealthState, HealthStatus};
