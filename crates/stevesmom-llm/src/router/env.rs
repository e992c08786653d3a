//! Router construction from environment settings

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::config::ProviderConfig;
use super::policy::{RoutingPolicy, RoutingStrategy};
use super::provider::LlmProvider;
use super::router_impl::ModelRouter;
use crate::error::{Error, Result};

/// Environment key for the routing strategy
pub const ENV_ROUTING_STRATEGY: &str = "ROUTING_STRATEGY";
/// Environment key for the cost threshold in USD
pub const ENV_MAX_COST_THRESHOLD: &str = "MAX_COST_THRESHOLD";
/// Environment key for the latency threshold in milliseconds
pub const ENV_MAX_LATENCY_MS: &str = "MAX_LATENCY_MS";
/// Environment key for the number of passes over the provider list
pub const ENV_RETRY_ATTEMPTS: &str = "RETRY_ATTEMPTS";

/// Router settings read from the environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Strategy name; unknown names resolve to cost-optimized
    pub routing_strategy: String,
    /// Maximum estimated cost per request in USD
    pub max_cost_threshold: f64,
    /// Latency threshold in milliseconds
    pub max_latency_ms: u64,
    /// Passes over the provider list
    pub retry_attempts: u32,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            routing_strategy: RoutingStrategy::CostOptimized.as_str().to_string(),
            max_cost_threshold: 0.10,
            max_latency_ms: 30_000,
            retry_attempts: 3,
        }
    }
}

impl RouterSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; absent keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(strategy) = lookup(ENV_ROUTING_STRATEGY) {
            settings.routing_strategy = strategy.trim().to_string();
        }
        if let Some(value) = lookup(ENV_MAX_COST_THRESHOLD) {
            settings.max_cost_threshold = parse_value(ENV_MAX_COST_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_LATENCY_MS) {
            settings.max_latency_ms = parse_value(ENV_MAX_LATENCY_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_RETRY_ATTEMPTS) {
            settings.retry_attempts = parse_value(ENV_RETRY_ATTEMPTS, &value)?;
        }

        Ok(settings)
    }

    /// Default routing policy described by these settings
    #[must_use]
    pub fn default_policy(&self) -> RoutingPolicy {
        RoutingPolicy::new(RoutingStrategy::parse_or_default(&self.routing_strategy))
            .with_max_cost(self.max_cost_threshold)
            .with_max_latency(self.max_latency_ms as f64 / 1000.0)
            .with_retry_attempts(self.retry_attempts)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::invalid_config(key, format!("'{value}': {e}")))
}

/// A provider handed over by a resolver
#[derive(Clone)]
pub struct ResolvedProvider {
    /// The provider instance
    pub provider: Arc<dyn LlmProvider>,
    /// External priority; lower values are registered first
    pub priority: i32,
}

impl ResolvedProvider {
    /// Pair a provider with its external priority
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, priority: i32) -> Self {
        Self { provider, priority }
    }
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("provider", &self.provider.name())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Source of configured providers
#[async_trait::async_trait]
pub trait ProviderResolver: Send + Sync {
    /// Providers that should be registered
    async fn resolve(&self) -> Result<Vec<ResolvedProvider>>;
}

/// Resolver over a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    providers: Vec<ResolvedProvider>,
}

impl StaticResolver {
    /// Create a resolver over `providers`
    #[must_use]
    pub fn new(providers: Vec<ResolvedProvider>) -> Self {
        Self { providers }
    }
}

#[async_trait::async_trait]
impl ProviderResolver for StaticResolver {
    async fn resolve(&self) -> Result<Vec<ResolvedProvider>> {
        Ok(self.providers.clone())
    }
}

/// Build a router from settings and resolved providers
///
/// Providers are registered in ascending external priority. Router priority
/// is `max(1, 10 - external)` and fallback order is the registration index.
/// A provider whose initialization fails is skipped with a warning.
pub async fn create_router_from_env(
    settings: &RouterSettings,
    resolver: &dyn ProviderResolver,
) -> Result<ModelRouter> {
    let policy = settings.default_policy();
    policy.validate()?;
    let router = ModelRouter::new(policy);

    let mut resolved = resolver.resolve().await?;
    resolved.sort_by_key(|r| r.priority);

    let mut registered: u32 = 0;
    for entry in resolved {
        let name = entry.provider.name().to_string();
        let config = ProviderConfig::new()
            .with_priority(10_i32.saturating_sub(entry.priority).max(1))
            .with_fallback_order(registered);

        match router.add_provider(entry.provider, config).await {
            Ok(()) => registered += 1,
            Err(e) => warn!(provider = %name, error = %e, "Skipping provider that failed to initialize"),
        }
    }

    info!(
        providers = registered,
        strategy = %router.default_policy().strategy,
        "Model router ready"
    );
    Ok(router)
}
