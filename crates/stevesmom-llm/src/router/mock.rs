//! Mock LLM Provider for testing
//!
//! A scripted provider with configurable cost, latency, capabilities and
//! failures. It performs no I/O.

use super::provider::LlmProvider;
use super::types::{Capability, HealthStatus};
use crate::completion::{CompletionResponse, GenerationConfig, TextStream, TokenUsage};
use crate::error::{Error, Result};
use crate::message::Message;

use futures::StreamExt;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum FailMode {
    Never,
    Always(Error),
    FirstN { remaining: usize, error: Error },
}

/// A mock LLM provider that returns queued responses or a default one.
pub struct MockProvider {
    name: String,
    models: Vec<String>,
    capabilities: BTreeSet<Capability>,
    cost: f64,
    latency: Duration,
    default_response: String,
    responses: Mutex<VecDeque<String>>,
    fail_mode: Mutex<FailMode>,
    stream_chunks: Option<Vec<String>>,
    mid_stream_error: Option<Error>,
    init_error: Option<Error>,
    api_key_valid: bool,
    unhealthy: Option<String>,
    calls: AtomicUsize,
    initialized: AtomicBool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("mock")
    }
}

impl MockProvider {
    /// Create a new mock provider.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            models: vec!["mock-model".to_string()],
            capabilities: [Capability::TextGeneration, Capability::Streaming]
                .into_iter()
                .collect(),
            cost: 0.001,
            latency: Duration::ZERO,
            default_response: "mock response".to_string(),
            responses: Mutex::new(VecDeque::new()),
            fail_mode: Mutex::new(FailMode::Never),
            stream_chunks: None,
            mid_stream_error: None,
            init_error: None,
            api_key_valid: true,
            unhealthy: None,
            calls: AtomicUsize::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Set the models this provider lists.
    #[must_use]
    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = models.iter().map(|m| (*m).to_string()).collect();
        self
    }

    /// Set declared capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.iter().copied().collect();
        self
    }

    /// Set the estimated cost per request.
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Delay every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Set the response returned when the queue is empty.
    #[must_use]
    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.default_response = content.into();
        self
    }

    /// Fail every call with `error`.
    #[must_use]
    pub fn failing(self, error: Error) -> Self {
        *self.fail_mode.lock().unwrap_or_else(|e| e.into_inner()) = FailMode::Always(error);
        self
    }

    /// Fail the first `times` calls with `error`.
    #[must_use]
    pub fn failing_times(self, times: usize, error: Error) -> Self {
        *self.fail_mode.lock().unwrap_or_else(|e| e.into_inner()) = FailMode::FirstN {
            remaining: times,
            error,
        };
        self
    }

    /// Stream these chunks instead of a single full response.
    #[must_use]
    pub fn with_stream_chunks(mut self, chunks: &[&str]) -> Self {
        self.stream_chunks = Some(chunks.iter().map(|c| (*c).to_string()).collect());
        self
    }

    /// End streams with `error` after the scripted chunks.
    #[must_use]
    pub fn with_mid_stream_error(mut self, error: Error) -> Self {
        self.mid_stream_error = Some(error);
        self
    }

    /// Fail `initialize` with `error`.
    #[must_use]
    pub fn with_init_error(mut self, error: Error) -> Self {
        self.init_error = Some(error);
        self
    }

    /// Report the API key as invalid.
    #[must_use]
    pub fn with_invalid_api_key(mut self) -> Self {
        self.api_key_valid = false;
        self
    }

    /// Report unhealthy with `message`.
    #[must_use]
    pub fn with_unhealthy(mut self, message: impl Into<String>) -> Self {
        self.unhealthy = Some(message.into());
        self
    }

    /// Add a response to the queue.
    pub fn add_response(&self, content: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(content.into());
    }

    /// Number of generate/stream calls received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether `initialize` has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn begin_call(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut mode = self.fail_mode.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *mode {
            FailMode::Never => Ok(()),
            FailMode::Always(error) => Err(error.clone()),
            FailMode::FirstN { remaining, error } => {
                if *remaining == 0 {
                    return Ok(());
                }
                *remaining -= 1;
                Err(error.clone())
            }
        }
    }

    fn next_content(&self) -> String {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone())
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> BTreeSet<Capability> {
        self.capabilities.clone()
    }

    fn available_models(&self) -> Vec<String> {
        self.models.clone()
    }

    async fn initialize(&self) -> Result<()> {
        if let Some(error) = &self.init_error {
            return Err(error.clone());
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn generate_response(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<CompletionResponse> {
        self.begin_call().await?;

        let content = self.next_content();
        let prompt_tokens: usize = messages.iter().map(|m| self.count_tokens(&m.text())).sum();
        let completion_tokens = self.count_tokens(&content);

        let mut response = CompletionResponse::new(content, &config.model, &self.name);
        response.usage = TokenUsage::new(
            u32::try_from(prompt_tokens).unwrap_or(u32::MAX),
            u32::try_from(completion_tokens).unwrap_or(u32::MAX),
        );
        response.finish_reason = Some("stop".to_string());
        Ok(response)
    }

    async fn stream_response(
        &self,
        _messages: &[Message],
        _config: &GenerationConfig,
    ) -> Result<TextStream> {
        self.begin_call().await?;

        let mut items: Vec<Result<String>> = match &self.stream_chunks {
            Some(chunks) => chunks.iter().cloned().map(Ok).collect(),
            None => vec![Ok(self.next_content())],
        };
        if let Some(error) = &self.mid_stream_error {
            items.push(Err(error.clone()));
        }
        Ok(futures::stream::iter(items).boxed())
    }

    fn estimate_cost(&self, _messages: &[Message], _config: &GenerationConfig) -> f64 {
        self.cost
    }

    async fn validate_api_key(&self) -> bool {
        self.api_key_valid
    }

    async fn health_check(&self) -> HealthStatus {
        match &self.unhealthy {
            Some(message) => HealthStatus::unhealthy(&self.name, message),
            None => HealthStatus::healthy(&self.name),
        }
    }
}
