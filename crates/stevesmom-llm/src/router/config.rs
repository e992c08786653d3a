//! Provider configuration and router snapshots

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::policy::RoutingPolicy;
use crate::error::{Error, Result};

/// Per-provider routing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Higher is preferred
    pub priority: i32,
    /// Relative share under load balancing
    pub weight: f64,
    /// Sliding 60 s request limit
    pub max_requests_per_minute: u32,
    /// Maximum estimated cost per request in USD
    pub max_cost_per_request: f64,
    /// Disabled providers are never routed to
    pub enabled: bool,
    /// Position under failover (0 = primary)
    pub fallback_order: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            priority: 1,
            weight: 1.0,
            max_requests_per_minute: 60,
            max_cost_per_request: 1.0,
            enabled: true,
            fallback_order: 0,
        }
    }
}

impl ProviderConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set priority
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set load balancing weight
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Set requests per minute limit
    #[must_use]
    pub fn with_max_requests_per_minute(mut self, rpm: u32) -> Self {
        self.max_requests_per_minute = rpm;
        self
    }

    /// Set per-request cost ceiling
    #[must_use]
    pub fn with_max_cost_per_request(mut self, cost: f64) -> Self {
        self.max_cost_per_request = cost;
        self
    }

    /// Set enabled flag
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set fallback order
    #[must_use]
    pub fn with_fallback_order(mut self, order: u32) -> Self {
        self.fallback_order = order;
        self
    }
}

/// Partial update of a [`ProviderConfig`]
///
/// Fields use wide types so out-of-range input reaches validation instead of
/// failing deserialization with a less useful message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfigUpdate {
    /// New priority (> 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    /// New weight (> 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// New requests per minute (> 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_requests_per_minute: Option<i64>,
    /// New cost ceiling (> 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cost_per_request: Option<f64>,
    /// New enabled flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// New fallback order (>= 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_order: Option<i64>,
}

impl ProviderConfigUpdate {
    /// Check every present field
    pub fn validate(&self) -> Result<()> {
        if let Some(priority) = self.priority {
            if priority <= 0 || priority > i64::from(i32::MAX) {
                return Err(Error::invalid_config(
                    "priority",
                    format!("must be a positive integer, got {priority}"),
                ));
            }
        }
        if let Some(weight) = self.weight {
            positive_number("weight", weight)?;
        }
        if let Some(rpm) = self.max_requests_per_minute {
            if rpm <= 0 || rpm > i64::from(u32::MAX) {
                return Err(Error::invalid_config(
                    "max_requests_per_minute",
                    format!("must be a positive integer, got {rpm}"),
                ));
            }
        }
        if let Some(cost) = self.max_cost_per_request {
            positive_number("max_cost_per_request", cost)?;
        }
        if let Some(order) = self.fallback_order {
            if order < 0 || order > i64::from(u32::MAX) {
                return Err(Error::invalid_config(
                    "fallback_order",
                    format!("must be a non-negative integer, got {order}"),
                ));
            }
        }
        Ok(())
    }

    /// Validate, then write every present field into `config`
    pub fn apply(&self, config: &mut ProviderConfig) -> Result<()> {
        self.validate()?;

        if let Some(priority) = self.priority {
            config.priority = to_int("priority", priority)?;
        }
        if let Some(weight) = self.weight {
            config.weight = weight;
        }
        if let Some(rpm) = self.max_requests_per_minute {
            config.max_requests_per_minute = to_int("max_requests_per_minute", rpm)?;
        }
        if let Some(cost) = self.max_cost_per_request {
            config.max_cost_per_request = cost;
        }
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(order) = self.fallback_order {
            config.fallback_order = to_int("fallback_order", order)?;
        }
        Ok(())
    }
}

impl From<&ProviderConfig> for ProviderConfigUpdate {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            priority: Some(i64::from(config.priority)),
            weight: Some(config.weight),
            max_requests_per_minute: Some(i64::from(config.max_requests_per_minute)),
            max_cost_per_request: Some(config.max_cost_per_request),
            enabled: Some(config.enabled),
            fallback_order: Some(i64::from(config.fallback_order)),
        }
    }
}

fn positive_number(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_config(
            field,
            format!("must be a positive number, got {value}"),
        ))
    }
}

fn to_int<T: TryFrom<i64>>(field: &str, value: i64) -> Result<T> {
    T::try_from(value).map_err(|_| Error::invalid_config(field, format!("{value} is out of range")))
}

/// Full router state as produced by a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterSnapshot {
    /// Default routing policy
    pub default_policy: RoutingPolicy,
    /// Per-provider configuration
    pub providers: BTreeMap<String, ProviderConfig>,
}

/// Configuration accepted by the router's loader
///
/// Every part is optional; absent parts leave the router unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfiguration {
    /// Replacement default policy
    pub default_policy: Option<RoutingPolicy>,
    /// Per-provider updates
    pub providers: BTreeMap<String, ProviderConfigUpdate>,
}

impl RouterConfiguration {
    /// Parse from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::invalid_config("configuration", e.to_string()))
    }

    /// Check the policy and every provider update
    pub fn validate(&self) -> Result<()> {
        if let Some(policy) = &self.default_policy {
            policy.validate()?;
        }
        for (name, update) in &self.providers {
            update.validate().map_err(|e| match e {
                Error::InvalidConfig { field, message } => {
                    Error::invalid_config(format!("providers.{name}.{field}"), message)
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

impl From<RouterSnapshot> for RouterConfiguration {
    fn from(snapshot: RouterSnapshot) -> Self {
        Self {
            default_policy: Some(snapshot.default_policy),
            providers: snapshot
                .providers
                .iter()
                .map(|(name, config)| (name.clone(), ProviderConfigUpdate::from(config)))
                .collect(),
        }
    }
}
