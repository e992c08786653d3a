//! Candidate ordering per routing strategy

use rand::Rng;
use std::sync::{Arc, Mutex};

use super::policy::{RoutingPolicy, RoutingStrategy};
use super::provider::LlmProvider;
use super::state::ProviderRuntime;

/// An eligible provider together with the figures ordering looks at
#[derive(Clone)]
pub(crate) struct Candidate {
    pub(crate) name: String,
    pub(crate) provider: Arc<dyn LlmProvider>,
    pub(crate) cost: f64,
    pub(crate) priority: i32,
    pub(crate) weight: f64,
    pub(crate) fallback_order: u32,
    pub(crate) capability_count: usize,
    pub(crate) avg_latency: Option<f64>,
    pub(crate) seq: u64,
    pub(crate) max_requests_per_minute: u32,
    pub(crate) runtime: Arc<Mutex<ProviderRuntime>>,
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("name", &self.name)
            .field("cost", &self.cost)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Order candidates for one request
///
/// Every strategy sorts stably over registration order. Preferred providers
/// are then moved to the front in the order the policy lists them.
pub(crate) fn order_candidates<R: Rng + ?Sized>(
    mut candidates: Vec<Candidate>,
    policy: &RoutingPolicy,
    rng: &mut R,
) -> Vec<Candidate> {
    candidates.sort_by_key(|c| c.seq);

    match policy.strategy {
        RoutingStrategy::CostOptimized => {
            candidates.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        }
        RoutingStrategy::LatencyOptimized => {
            candidates.sort_by(|a, b| latency_key(a).total_cmp(&latency_key(b)));
        }
        RoutingStrategy::CapabilityBased => {
            candidates.sort_by(|a, b| b.capability_count.cmp(&a.capability_count));
        }
        RoutingStrategy::RoundRobin => {}
        RoutingStrategy::Failover => {
            candidates.sort_by_key(|c| c.fallback_order);
        }
        RoutingStrategy::LoadBalanced => {
            candidates = weighted_order(candidates, rng);
        }
        RoutingStrategy::Priority => {
            candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
    }

    move_preferred_to_front(candidates, &policy.preferred_providers)
}

fn latency_key(candidate: &Candidate) -> f64 {
    candidate.avg_latency.unwrap_or(f64::INFINITY)
}

/// Weighted random order via cumulative-weight sampling without replacement
fn weighted_order<R: Rng + ?Sized>(mut remaining: Vec<Candidate>, rng: &mut R) -> Vec<Candidate> {
    let mut ordered = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let mut cumulative = Vec::with_capacity(remaining.len());
        let mut total = 0.0;
        for candidate in &remaining {
            total += effective_weight(candidate.weight);
            cumulative.push(total);
        }

        if total <= 0.0 {
            ordered.append(&mut remaining);
            break;
        }

        let target = rng.gen::<f64>() * total;
        let idx = cumulative
            .partition_point(|&c| c <= target)
            .min(remaining.len() - 1);
        ordered.push(remaining.remove(idx));
    }

    ordered
}

fn effective_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

fn move_preferred_to_front(mut candidates: Vec<Candidate>, preferred: &[String]) -> Vec<Candidate> {
    if preferred.is_empty() {
        return candidates;
    }

    let mut front = Vec::new();
    for name in preferred {
        if let Some(pos) = candidates.iter().position(|c| &c.name == name) {
            front.push(candidates.remove(pos));
        }
    }
    front.append(&mut candidates);
    front
}
