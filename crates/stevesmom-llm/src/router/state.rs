//! Per-provider runtime bookkeeping

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};

/// Consecutive errors tolerated before the breaker trips
pub(crate) const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Width of the request rate window
pub(crate) const RATE_WINDOW: Duration = Duration::from_secs(60);

const LATENCY_HISTORY_LIMIT: usize = 100;
const LATENCY_HISTORY_KEEP: usize = 50;

/// Mutable state the router keeps per provider
#[derive(Debug)]
pub(crate) struct ProviderRuntime {
    request_times: VecDeque<Instant>,
    latencies: Vec<Duration>,
    error_count: u32,
    breaker: CircuitBreaker,
}

impl ProviderRuntime {
    pub(crate) fn new(name: &str, recovery_timeout: Duration) -> Self {
        Self {
            request_times: VecDeque::new(),
            latencies: Vec::new(),
            error_count: 0,
            breaker: CircuitBreaker::new(
                name,
                CircuitBreakerConfig::new()
                    .with_failure_threshold(MAX_CONSECUTIVE_ERRORS + 1)
                    .with_recovery_timeout(recovery_timeout),
            ),
        }
    }

    pub(crate) fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub(crate) fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Drop stale timestamps and report whether another request fits
    pub(crate) fn check_rate_limit(&mut self, max_requests_per_minute: u32) -> bool {
        self.prune(Instant::now());
        self.request_times.len() < max_requests_per_minute as usize
    }

    pub(crate) fn record_request(&mut self, latency: Duration) {
        self.request_times.push_back(Instant::now());
        self.latencies.push(latency);
        if self.latencies.len() > LATENCY_HISTORY_LIMIT {
            let excess = self.latencies.len() - LATENCY_HISTORY_KEEP;
            self.latencies.drain(..excess);
        }
        self.error_count = 0;
        self.breaker.record_success();
    }

    pub(crate) fn record_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
        self.breaker.record_failure();
    }

    /// Mean latency in seconds, `None` without history
    pub(crate) fn average_latency(&self) -> Option<f64> {
        if self.latencies.is_empty() {
            return None;
        }
        let total: f64 = self.latencies.iter().map(Duration::as_secs_f64).sum();
        Some(total / self.latencies.len() as f64)
    }

    pub(crate) fn recent_requests(&mut self) -> usize {
        self.prune(Instant::now());
        self.request_times.len()
    }

    pub(crate) fn reset_breaker(&mut self) {
        self.error_count = 0;
        self.breaker.reset();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.request_times.front() {
            if now.duration_since(*oldest) >= RATE_WINDOW {
                self.request_times.pop_front();
            } else {
                break;
            }
        }
    }
}
