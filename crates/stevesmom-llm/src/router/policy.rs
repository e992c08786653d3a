//! Routing policy
//!
//! A [`RoutingPolicy`] is a value object: the router replaces its default
//! policy wholesale and never mutates one in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use super::types::Capability;
use crate::error::{Error, Result};

/// How eligible providers are ordered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Cheapest estimated cost first
    #[default]
    CostOptimized,
    /// Lowest mean observed latency first; providers without history last
    LatencyOptimized,
    /// Most declared capabilities first
    CapabilityBased,
    /// Registration order
    RoundRobin,
    /// Ascending fallback order
    Failover,
    /// Weighted random order
    LoadBalanced,
    /// Highest configured priority first
    Priority,
}

impl RoutingStrategy {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CostOptimized => "cost_optimized",
            Self::LatencyOptimized => "latency_optimized",
            Self::CapabilityBased => "capability_based",
            Self::RoundRobin => "round_robin",
            Self::Failover => "failover",
            Self::LoadBalanced => "load_balanced",
            Self::Priority => "priority",
        }
    }

    /// Parse a strategy name, falling back to cost-optimized
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| {
            warn!(strategy = %s, "Unknown routing strategy, using cost_optimized");
            Self::CostOptimized
        })
    }
}

impl std::fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoutingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cost_optimized" => Ok(Self::CostOptimized),
            "latency_optimized" => Ok(Self::LatencyOptimized),
            "capability_based" => Ok(Self::CapabilityBased),
            "round_robin" => Ok(Self::RoundRobin),
            "failover" => Ok(Self::Failover),
            "load_balanced" => Ok(Self::LoadBalanced),
            "priority" => Ok(Self::Priority),
            other => Err(Error::InvalidPolicy(format!("unknown strategy '{other}'"))),
        }
    }
}

/// Policy applied to one routed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingPolicy {
    /// Ordering strategy
    pub strategy: RoutingStrategy,
    /// Maximum estimated cost per request in USD
    pub max_cost_threshold: f64,
    /// Latency above which a successful call is logged as slow, in seconds
    pub max_latency_threshold: f64,
    /// Capabilities every candidate must declare
    pub required_capabilities: BTreeSet<Capability>,
    /// Providers moved to the front of the order, in this order
    pub preferred_providers: Vec<String>,
    /// Try further providers after the first one fails
    pub fallback_enabled: bool,
    /// Passes over the provider list
    pub retry_attempts: u32,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            strategy: RoutingStrategy::CostOptimized,
            max_cost_threshold: 0.10,
            max_latency_threshold: 30.0,
            required_capabilities: BTreeSet::new(),
            preferred_providers: Vec::new(),
            fallback_enabled: true,
            retry_attempts: 3,
        }
    }
}

impl RoutingPolicy {
    /// Create a policy with the given strategy and default limits
    #[must_use]
    pub fn new(strategy: RoutingStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Set max cost threshold
    #[must_use]
    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost_threshold = max_cost;
        self
    }

    /// Set max latency threshold in seconds
    #[must_use]
    pub fn with_max_latency(mut self, seconds: f64) -> Self {
        self.max_latency_threshold = seconds;
        self
    }

    /// Require a capability
    #[must_use]
    pub fn require(mut self, capability: Capability) -> Self {
        self.required_capabilities.insert(capability);
        self
    }

    /// Set preferred providers
    #[must_use]
    pub fn with_preferred(mut self, providers: Vec<String>) -> Self {
        self.preferred_providers = providers;
        self
    }

    /// Enable or disable fallback
    #[must_use]
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    /// Set retry attempts
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Check thresholds and attempt count
    pub fn validate(&self) -> Result<()> {
        if !self.max_cost_threshold.is_finite() || self.max_cost_threshold < 0.0 {
            return Err(Error::InvalidPolicy(format!(
                "max_cost_threshold must be a non-negative number, got {}",
                self.max_cost_threshold
            )));
        }
        if !self.max_latency_threshold.is_finite() || self.max_latency_threshold <= 0.0 {
            return Err(Error::InvalidPolicy(format!(
                "max_latency_threshold must be positive, got {}",
                self.max_latency_threshold
            )));
        }
        if self.retry_attempts < 1 {
            return Err(Error::InvalidPolicy(
                "retry_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
