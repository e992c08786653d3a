//! Core router types

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Something a provider can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Plain text generation
    TextGeneration,
    /// Incremental streaming output
    Streaming,
    /// Tool/function calling
    FunctionCalling,
    /// Image input
    Vision,
    /// Code generation
    CodeGeneration,
    /// Multi-step reasoning
    Reasoning,
    /// Large context windows
    LongContext,
    /// Embedding vectors
    Embeddings,
}

impl Capability {
    /// Every capability, in declaration order
    pub const ALL: [Capability; 8] = [
        Self::TextGeneration,
        Self::Streaming,
        Self::FunctionCalling,
        Self::Vision,
        Self::CodeGeneration,
        Self::Reasoning,
        Self::LongContext,
        Self::Embeddings,
    ];

    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextGeneration => "text_generation",
            Self::Streaming => "streaming",
            Self::FunctionCalling => "function_calling",
            Self::Vision => "vision",
            Self::CodeGeneration => "code_generation",
            Self::Reasoning => "reasoning",
            Self::LongContext => "long_context",
            Self::Embeddings => "embeddings",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| Error::invalid_config("capability", format!("unknown capability '{s}'")))
    }
}

/// Coarse provider health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Fully operational
    Healthy,
    /// Responding with problems
    Degraded,
    /// Not usable
    Unhealthy,
}

/// Result of a provider health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Health state
    pub status: HealthState,
    /// Provider name
    pub provider: String,
    /// Optional detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthStatus {
    /// Healthy status for `provider`
    #[must_use]
    pub fn healthy(provider: impl Into<String>) -> Self {
        Self {
            status: HealthState::Healthy,
            provider: provider.into(),
            message: None,
        }
    }

    /// Unhealthy status with a reason
    #[must_use]
    pub fn unhealthy(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: HealthState::Unhealthy,
            provider: provider.into(),
            message: Some(message.into()),
        }
    }
}
