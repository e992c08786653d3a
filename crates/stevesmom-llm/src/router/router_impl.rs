//! Model Router implementation
//!
//! This module contains the [`ModelRouter`], which owns the provider
//! registry and routes each request through an ordered list of eligible
//! providers, falling back on failure and retrying the whole list with
//! backoff.

use super::config::{ProviderConfig, ProviderConfigUpdate, RouterConfiguration, RouterSnapshot};
use super::policy::RoutingPolicy;
use super::provider::LlmProvider;
use super::state::ProviderRuntime;
use super::strategy::{order_candidates, Candidate};
use super::types::HealthStatus;
use crate::completion::{CompletionResponse, GenerationConfig, TextStream};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::resilience::{normalize_error, CircuitState, ExponentialBackoff};

use futures::StreamExt;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Default time an open provider breaker waits before a trial call
pub const DEFAULT_BREAKER_RECOVERY: Duration = Duration::from_secs(60);

struct ProviderSlot {
    provider: Arc<dyn LlmProvider>,
    config: ProviderConfig,
    runtime: Arc<Mutex<ProviderRuntime>>,
    seq: u64,
}

/// Status of one provider as reported by [`ModelRouter::provider_status`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatus {
    /// Result of the provider's own health check
    #[serde(flatten)]
    pub health: HealthStatus,
    /// Enabled flag
    pub enabled: bool,
    /// Configured priority
    pub priority: i32,
    /// Configured weight
    pub weight: f64,
    /// Breaker state
    pub circuit_state: CircuitState,
    /// Consecutive error count
    pub error_count: u32,
    /// Mean latency in seconds
    pub average_latency: Option<f64>,
    /// Requests in the current 60 s window
    pub recent_requests: usize,
}

/// Policy-driven router over registered providers
pub struct ModelRouter {
    providers: RwLock<HashMap<String, ProviderSlot>>,
    default_policy: RwLock<RoutingPolicy>,
    retry_backoff: ExponentialBackoff,
    breaker_recovery: Duration,
    next_seq: AtomicU64,
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new(RoutingPolicy::default())
    }
}

impl ModelRouter {
    /// Create a router with a default policy
    #[must_use]
    pub fn new(default_policy: RoutingPolicy) -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            default_policy: RwLock::new(default_policy),
            retry_backoff: ExponentialBackoff::new()
                .with_base_delay(Duration::from_secs(1))
                .with_multiplier(2.0)
                .with_max_delay(Duration::from_secs(300))
                .with_jitter(false),
            breaker_recovery: DEFAULT_BREAKER_RECOVERY,
            next_seq: AtomicU64::new(0),
        }
    }

    /// Replace the delay schedule between passes over the provider list
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the recovery timeout of breakers for providers added afterwards
    #[must_use]
    pub fn with_breaker_recovery(mut self, timeout: Duration) -> Self {
        self.breaker_recovery = timeout;
        self
    }

    /// Register a provider under its own name
    ///
    /// The provider's `initialize` hook runs first; if it fails the provider
    /// is not registered. Re-adding a name replaces the provider and resets
    /// its runtime state but keeps its registration position.
    pub async fn add_provider(
        &self,
        provider: Arc<dyn LlmProvider>,
        config: ProviderConfig,
    ) -> Result<()> {
        let name = provider.name().to_string();
        ProviderConfigUpdate::from(&config).validate()?;
        provider.initialize().await?;

        let runtime = Arc::new(Mutex::new(ProviderRuntime::new(&name, self.breaker_recovery)));
        let mut providers = self.write_providers();
        let seq = providers
            .get(&name)
            .map(|slot| slot.seq)
            .unwrap_or_else(|| self.next_seq.fetch_add(1, Ordering::SeqCst));

        info!(provider = %name, priority = config.priority, "Registered LLM provider");
        providers.insert(
            name,
            ProviderSlot {
                provider,
                config,
                runtime,
                seq,
            },
        );
        Ok(())
    }

    /// Unregister a provider
    pub fn remove_provider(&self, name: &str) -> bool {
        let removed = self.write_providers().remove(name).is_some();
        if removed {
            info!(provider = %name, "Removed LLM provider");
        }
        removed
    }

    /// List registered provider names in registration order
    #[must_use]
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.read_providers();
        let mut slots: Vec<_> = providers.iter().collect();
        slots.sort_by_key(|(_, slot)| slot.seq);
        slots.into_iter().map(|(name, _)| name.clone()).collect()
    }

    /// Check if a provider is registered
    #[must_use]
    pub fn has_provider(&self, name: &str) -> bool {
        self.read_providers().contains_key(name)
    }

    /// Get a provider's configuration
    #[must_use]
    pub fn provider_config(&self, name: &str) -> Option<ProviderConfig> {
        self.read_providers().get(name).map(|slot| slot.config.clone())
    }

    /// Get the default policy
    #[must_use]
    pub fn default_policy(&self) -> RoutingPolicy {
        self.default_policy
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the default policy
    pub fn update_default_policy(&self, policy: RoutingPolicy) -> Result<()> {
        policy.validate()?;
        info!(strategy = %policy.strategy, "Updated default routing policy");
        *self.default_policy.write().unwrap_or_else(|e| e.into_inner()) = policy;
        Ok(())
    }

    /// Apply a partial update to one provider's configuration
    pub fn update_provider_config(&self, name: &str, update: &ProviderConfigUpdate) -> Result<()> {
        let mut providers = self.write_providers();
        let slot = providers
            .get_mut(name)
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))?;
        update.apply(&mut slot.config)?;
        debug!(provider = %name, config = ?slot.config, "Updated provider config");
        Ok(())
    }

    /// Enable a provider
    pub fn enable_provider(&self, name: &str) -> Result<()> {
        self.set_enabled(name, true)
    }

    /// Disable a provider
    pub fn disable_provider(&self, name: &str) -> Result<()> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut providers = self.write_providers();
        let slot = providers
            .get_mut(name)
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))?;
        slot.config.enabled = enabled;
        info!(provider = %name, enabled = enabled, "Changed provider availability");
        Ok(())
    }

    /// Current default policy and provider configurations
    #[must_use]
    pub fn configuration_snapshot(&self) -> RouterSnapshot {
        let providers = self
            .read_providers()
            .iter()
            .map(|(name, slot)| (name.clone(), slot.config.clone()))
            .collect();
        RouterSnapshot {
            default_policy: self.default_policy(),
            providers,
        }
    }

    /// Apply a configuration produced by [`Self::configuration_snapshot`]
    ///
    /// Everything is validated before anything is applied. Provider keys that
    /// are not registered are skipped with a warning.
    pub fn load_configuration(&self, configuration: &RouterConfiguration) -> Result<()> {
        configuration.validate()?;

        if let Some(policy) = &configuration.default_policy {
            self.update_default_policy(policy.clone())?;
        }

        let mut providers = self.write_providers();
        for (name, update) in &configuration.providers {
            match providers.get_mut(name) {
                Some(slot) => update.apply(&mut slot.config)?,
                None => warn!(provider = %name, "Skipping configuration for unknown provider"),
            }
        }
        Ok(())
    }

    /// Health and runtime figures for every provider
    pub async fn provider_status(&self) -> BTreeMap<String, ProviderStatus> {
        let entries: Vec<_> = self
            .read_providers()
            .iter()
            .map(|(name, slot)| {
                (
                    name.clone(),
                    Arc::clone(&slot.provider),
                    slot.config.clone(),
                    Arc::clone(&slot.runtime),
                )
            })
            .collect();

        let mut statuses = BTreeMap::new();
        for (name, provider, config, runtime) in entries {
            let health = provider.health_check().await;
            let status = {
                let mut runtime = lock_runtime(&runtime);
                ProviderStatus {
                    health,
                    enabled: config.enabled,
                    priority: config.priority,
                    weight: config.weight,
                    circuit_state: runtime.breaker().state(),
                    error_count: runtime.error_count(),
                    average_latency: runtime.average_latency(),
                    recent_requests: runtime.recent_requests(),
                }
            };
            statuses.insert(name, status);
        }
        statuses
    }

    /// Close every breaker and clear error counts
    pub fn reset_circuit_breakers(&self) {
        for slot in self.read_providers().values() {
            lock_runtime(&slot.runtime).reset_breaker();
        }
        info!("Reset all circuit breakers");
    }

    /// Run each provider's API key check
    pub async fn validate_providers(&self) -> BTreeMap<String, bool> {
        let entries: Vec<_> = self
            .read_providers()
            .iter()
            .map(|(name, slot)| (name.clone(), Arc::clone(&slot.provider)))
            .collect();

        let mut results = BTreeMap::new();
        for (name, provider) in entries {
            let valid = provider.validate_api_key().await;
            if !valid {
                warn!(provider = %name, "Provider API key validation failed");
            }
            results.insert(name, valid);
        }
        results
    }

    /// Names of eligible providers in the order a request would try them
    #[must_use]
    pub fn candidate_order(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
        policy: Option<&RoutingPolicy>,
    ) -> Vec<String> {
        let policy = self.resolve_policy(policy);
        self.ordered_candidates(messages, config, &policy)
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    /// Route a completion request
    ///
    /// Providers are tried one at a time in policy order. A failure moves on
    /// to the next provider; after a full pass the router waits and starts
    /// over, up to `retry_attempts` passes.
    #[instrument(skip(self, messages, config, policy), fields(model = %config.model))]
    pub async fn route_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
        policy: Option<&RoutingPolicy>,
    ) -> Result<CompletionResponse> {
        let policy = self.resolve_policy(policy);
        let candidates = self.ordered_candidates(messages, config, &policy);
        if candidates.is_empty() {
            return Err(Error::NoEligibleProviders {
                model: config.model.clone(),
            });
        }

        let attempts = policy.retry_attempts.max(1);
        let per_pass = if policy.fallback_enabled { candidates.len() } else { 1 };
        let mut last_error = None;

        for attempt in 0..attempts {
            for candidate in candidates.iter().take(per_pass) {
                if !admit(candidate) {
                    continue;
                }

                debug!(provider = %candidate.name, attempt = attempt, "Routing request");
                let started = Instant::now();
                match candidate.provider.generate_response(messages, config).await {
                    Ok(mut response) => {
                        let latency = started.elapsed();
                        response.response_time.get_or_insert(latency.as_secs_f64());
                        lock_runtime(&candidate.runtime).record_request(latency);

                        if latency.as_secs_f64() > policy.max_latency_threshold {
                            warn!(
                                provider = %candidate.name,
                                latency_s = latency.as_secs_f64(),
                                threshold_s = policy.max_latency_threshold,
                                "Provider response exceeded latency threshold"
                            );
                        }
                        info!(
                            provider = %candidate.name,
                            latency_ms = latency.as_millis() as u64,
                            "Request completed"
                        );
                        return Ok(response);
                    }
                    Err(e) => {
                        let normalized = normalize_error(&e, &candidate.name);
                        warn!(
                            provider = %candidate.name,
                            attempt = attempt,
                            code = normalized.code(),
                            error = %e,
                            "Provider failed, trying next"
                        );
                        lock_runtime(&candidate.runtime).record_error();
                        last_error = Some(e);
                    }
                }
            }

            if attempt + 1 < attempts {
                self.retry_backoff.wait(attempt).await;
            }
        }

        Err(last_error.unwrap_or(Error::AllProvidersFailed))
    }

    /// Route a streaming request
    ///
    /// Failing to start a stream falls back like [`Self::route_request`]. Once
    /// a stream is handed out, errors inside it reach the caller as items.
    #[instrument(skip(self, messages, config, policy), fields(model = %config.model))]
    pub async fn stream_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
        policy: Option<&RoutingPolicy>,
    ) -> Result<TextStream> {
        let policy = self.resolve_policy(policy);
        let candidates = self.ordered_candidates(messages, config, &policy);
        if candidates.is_empty() {
            return Err(Error::NoEligibleProviders {
                model: config.model.clone(),
            });
        }

        let attempts = policy.retry_attempts.max(1);
        let per_pass = if policy.fallback_enabled { candidates.len() } else { 1 };
        let mut last_error = None;

        for attempt in 0..attempts {
            for candidate in candidates.iter().take(per_pass) {
                if !admit(candidate) {
                    continue;
                }

                let started = Instant::now();
                match candidate.provider.stream_response(messages, config).await {
                    Ok(stream) => {
                        lock_runtime(&candidate.runtime).record_request(started.elapsed());
                        info!(provider = %candidate.name, "Stream started");

                        let name = candidate.name.clone();
                        return Ok(stream
                            .inspect(move |item| {
                                if let Err(e) = item {
                                    warn!(provider = %name, error = %e, "Stream failed mid-response");
                                }
                            })
                            .boxed());
                    }
                    Err(e) => {
                        warn!(
                            provider = %candidate.name,
                            attempt = attempt,
                            error = %e,
                            "Provider failed to start stream, trying next"
                        );
                        lock_runtime(&candidate.runtime).record_error();
                        last_error = Some(e);
                    }
                }
            }

            if attempt + 1 < attempts {
                self.retry_backoff.wait(attempt).await;
            }
        }

        Err(last_error.unwrap_or(Error::AllProvidersFailed))
    }

    fn resolve_policy(&self, policy: Option<&RoutingPolicy>) -> RoutingPolicy {
        policy.cloned().unwrap_or_else(|| self.default_policy())
    }

    fn ordered_candidates(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
        policy: &RoutingPolicy,
    ) -> Vec<Candidate> {
        let candidates: Vec<Candidate> = self
            .read_providers()
            .iter()
            .filter_map(|(name, slot)| eligible(name, slot, messages, config, policy))
            .collect();

        if candidates.is_empty() {
            debug!(model = %config.model, "No eligible providers");
            return candidates;
        }

        order_candidates(candidates, policy, &mut rand::thread_rng())
    }

    fn read_providers(&self) -> RwLockReadGuard<'_, HashMap<String, ProviderSlot>> {
        self.providers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_providers(&self) -> RwLockWriteGuard<'_, HashMap<String, ProviderSlot>> {
        self.providers.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Build a candidate if `slot` passes every eligibility check
fn eligible(
    name: &str,
    slot: &ProviderSlot,
    messages: &[Message],
    config: &GenerationConfig,
    policy: &RoutingPolicy,
) -> Option<Candidate> {
    if !slot.config.enabled {
        return None;
    }

    let capabilities = slot.provider.capabilities();
    if !policy.required_capabilities.is_subset(&capabilities) {
        return None;
    }

    if !config.model.is_empty() && !slot.provider.available_models().contains(&config.model) {
        return None;
    }

    let cost = slot.provider.estimate_cost(messages, config);
    if !(cost <= policy.max_cost_threshold && cost <= slot.config.max_cost_per_request) {
        debug!(provider = %name, cost = cost, "Provider over cost threshold");
        return None;
    }

    Some(Candidate {
        name: name.to_string(),
        provider: Arc::clone(&slot.provider),
        cost,
        priority: slot.config.priority,
        weight: slot.config.weight,
        fallback_order: slot.config.fallback_order,
        capability_count: capabilities.len(),
        avg_latency: lock_runtime(&slot.runtime).average_latency(),
        seq: slot.seq,
        max_requests_per_minute: slot.config.max_requests_per_minute,
        runtime: Arc::clone(&slot.runtime),
    })
}

/// Rate window first, then the breaker, so a skipped provider never claims
/// the half-open trial
fn admit(candidate: &Candidate) -> bool {
    let mut runtime = lock_runtime(&candidate.runtime);
    if !runtime.check_rate_limit(candidate.max_requests_per_minute) {
        debug!(provider = %candidate.name, "Provider over request rate, skipping");
        return false;
    }
    if !runtime.breaker().can_execute() {
        debug!(provider = %candidate.name, "Provider circuit open, skipping");
        return false;
    }
    true
}

fn lock_runtime(runtime: &Mutex<ProviderRuntime>) -> MutexGuard<'_, ProviderRuntime> {
    runtime.lock().unwrap_or_else(|e| e.into_inner())
}
