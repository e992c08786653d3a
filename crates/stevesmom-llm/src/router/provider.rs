//! LLM Provider trait definition
//!
//! This module defines the contract every provider plugged into the router
//! must implement. Only `generate_response` and the descriptive methods are
//! required; the rest have defaults that suit providers without the feature.

use futures::StreamExt;
use std::collections::BTreeSet;

use super::types::{Capability, HealthStatus};
use crate::completion::{CompletionResponse, GenerationConfig, TextStream};
use crate::error::Result;
use crate::message::Message;

/// Trait for LLM providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (unique key in the router)
    fn name(&self) -> &str;

    /// Capabilities this provider declares
    fn capabilities(&self) -> BTreeSet<Capability>;

    /// Get available models
    fn available_models(&self) -> Vec<String>;

    /// One-time setup, awaited when the provider is registered
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Generate a complete response
    async fn generate_response(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<CompletionResponse>;

    /// Stream a response as text chunks
    ///
    /// Providers without native streaming yield the full response as a
    /// single chunk.
    async fn stream_response(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<TextStream> {
        let response = self.generate_response(messages, config).await?;
        Ok(futures::stream::once(async move { Ok(response.content) }).boxed())
    }

    /// Estimated cost of the request in USD
    fn estimate_cost(&self, messages: &[Message], config: &GenerationConfig) -> f64;

    /// Rough token count for `text`
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count() / 4
    }

    /// Whether the configured credentials are accepted
    async fn validate_api_key(&self) -> bool {
        true
    }

    /// Report provider health
    async fn health_check(&self) -> HealthStatus {
        HealthStatus::healthy(self.name())
    }
}
