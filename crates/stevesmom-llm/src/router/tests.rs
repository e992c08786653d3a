//! Tests for router module

use super::state::ProviderRuntime;
use super::strategy::{order_candidates, Candidate};
use super::*;
use crate::completion::GenerationConfig;
use crate::error::Error;
use crate::message::Message;
use crate::resilience::{CircuitState, ExponentialBackoff};

use futures::StreamExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn router(strategy: RoutingStrategy) -> ModelRouter {
    ModelRouter::new(RoutingPolicy::new(strategy)).with_retry_backoff(
        ExponentialBackoff::new()
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(false),
    )
}

fn generation() -> GenerationConfig {
    GenerationConfig::new("mock-model")
}

fn messages() -> Vec<Message> {
    vec![Message::system("You are Steve's mom"), Message::user("hi mom")]
}

async fn add(router: &ModelRouter, provider: MockProvider, config: ProviderConfig) -> Arc<MockProvider> {
    let provider = Arc::new(provider);
    assert_ok!(router.add_provider(provider.clone(), config).await);
    provider
}

fn unavailable() -> Error {
    Error::Api("503 Service Unavailable".into())
}

#[tokio::test]
async fn test_eligibility_filters_by_cost() {
    let router = router(RoutingStrategy::Priority);
    add(&router, MockProvider::new("cheap").with_cost(0.01), ProviderConfig::new()).await;
    add(
        &router,
        MockProvider::new("pricey").with_cost(0.08),
        ProviderConfig::new().with_priority(100),
    )
    .await;

    let policy = RoutingPolicy::new(RoutingStrategy::Priority).with_max_cost(0.05);
    let order = router.candidate_order(&messages(), &generation(), Some(&policy));
    assert_eq!(order, vec!["cheap"]);
}

#[tokio::test]
async fn test_eligibility_checks() {
    let router = router(RoutingStrategy::RoundRobin);
    add(&router, MockProvider::new("plain"), ProviderConfig::new()).await;
    add(
        &router,
        MockProvider::new("vision").with_capabilities(&[Capability::TextGeneration, Capability::Vision]),
        ProviderConfig::new(),
    )
    .await;
    add(
        &router,
        MockProvider::new("other-model").with_models(&["grok-3"]),
        ProviderConfig::new(),
    )
    .await;
    add(
        &router,
        MockProvider::new("capped").with_cost(0.05),
        ProviderConfig::new().with_max_cost_per_request(0.01),
    )
    .await;
    add(&router, MockProvider::new("off"), ProviderConfig::new().with_enabled(false)).await;
    add(&router, MockProvider::new("unpriced").with_cost(f64::NAN), ProviderConfig::new()).await;

    let order = router.candidate_order(&messages(), &generation(), None);
    assert_eq!(order, vec!["plain", "vision"]);

    let policy = RoutingPolicy::new(RoutingStrategy::RoundRobin).require(Capability::Vision);
    let order = router.candidate_order(&messages(), &generation(), Some(&policy));
    assert_eq!(order, vec!["vision"]);

    let order = router.candidate_order(&messages(), &GenerationConfig::new("grok-3"), None);
    assert_eq!(order, vec!["other-model"]);
}

#[tokio::test]
async fn test_cost_optimized_sorts_ascending() {
    let router = router(RoutingStrategy::CostOptimized);
    add(&router, MockProvider::new("mid").with_cost(0.02), ProviderConfig::new()).await;
    add(&router, MockProvider::new("high").with_cost(0.04), ProviderConfig::new()).await;
    add(&router, MockProvider::new("low").with_cost(0.001), ProviderConfig::new()).await;

    let order = router.candidate_order(&messages(), &generation(), None);
    assert_eq!(order, vec!["low", "mid", "high"]);
}

#[tokio::test]
async fn test_failover_sorts_by_fallback_order() {
    let router = router(RoutingStrategy::Failover);
    add(&router, MockProvider::new("third"), ProviderConfig::new().with_fallback_order(2)).await;
    add(&router, MockProvider::new("first"), ProviderConfig::new().with_fallback_order(0)).await;
    add(&router, MockProvider::new("second"), ProviderConfig::new().with_fallback_order(1)).await;

    let order = router.candidate_order(&messages(), &generation(), None);
    assert_eq!(order, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_priority_and_capability_sorts_are_stable() {
    let router = router(RoutingStrategy::Priority);
    add(&router, MockProvider::new("a"), ProviderConfig::new().with_priority(5)).await;
    add(
        &router,
        MockProvider::new("b").with_capabilities(&[
            Capability::TextGeneration,
            Capability::Streaming,
            Capability::Reasoning,
        ]),
        ProviderConfig::new().with_priority(9),
    )
    .await;
    add(&router, MockProvider::new("c"), ProviderConfig::new().with_priority(5)).await;

    let order = router.candidate_order(&messages(), &generation(), None);
    assert_eq!(order, vec!["b", "a", "c"]);

    let policy = RoutingPolicy::new(RoutingStrategy::CapabilityBased);
    let order = router.candidate_order(&messages(), &generation(), Some(&policy));
    assert_eq!(order, vec!["b", "a", "c"]);

    let policy = RoutingPolicy::new(RoutingStrategy::RoundRobin);
    let order = router.candidate_order(&messages(), &generation(), Some(&policy));
    assert_eq!(order, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_latency_optimized_puts_unknown_last() {
    let router = router(RoutingStrategy::LatencyOptimized);
    add(
        &router,
        MockProvider::new("slow").with_latency(Duration::from_millis(40)),
        ProviderConfig::new(),
    )
    .await;
    add(&router, MockProvider::new("fresh"), ProviderConfig::new()).await;
    add(&router, MockProvider::new("fast"), ProviderConfig::new()).await;

    for name in ["slow", "fast"] {
        let policy = RoutingPolicy::new(RoutingStrategy::RoundRobin)
            .with_preferred(vec![name.to_string()])
            .with_fallback(false);
        let response = assert_ok!(router.route_request(&messages(), &generation(), Some(&policy)).await);
        assert_eq!(response.provider, name);
    }

    let order = router.candidate_order(&messages(), &generation(), None);
    assert_eq!(order, vec!["fast", "slow", "fresh"]);
}

#[tokio::test]
async fn test_preferred_providers_move_to_front() {
    let router = router(RoutingStrategy::CostOptimized);
    add(&router, MockProvider::new("a").with_cost(0.001), ProviderConfig::new()).await;
    add(&router, MockProvider::new("b").with_cost(0.002), ProviderConfig::new()).await;
    add(&router, MockProvider::new("c").with_cost(0.003), ProviderConfig::new()).await;

    let policy = RoutingPolicy::new(RoutingStrategy::CostOptimized)
        .with_preferred(vec!["c".to_string(), "missing".to_string(), "b".to_string()]);
    let order = router.candidate_order(&messages(), &generation(), Some(&policy));
    assert_eq!(order, vec!["c", "b", "a"]);
}

#[test]
fn test_load_balanced_prefers_heavier_weight() {
    fn candidate(name: &str, weight: f64, seq: u64) -> Candidate {
        Candidate {
            name: name.to_string(),
            provider: Arc::new(MockProvider::new(name)),
            cost: 0.0,
            priority: 1,
            weight,
            fallback_order: 0,
            capability_count: 1,
            avg_latency: None,
            seq,
            max_requests_per_minute: 60,
            runtime: Arc::new(Mutex::new(ProviderRuntime::new(name, Duration::from_secs(60)))),
        }
    }

    let policy = RoutingPolicy::new(RoutingStrategy::LoadBalanced);
    let mut rng = StdRng::seed_from_u64(7);
    let mut heavy_first = 0;

    for _ in 0..1000 {
        let ordered = order_candidates(
            vec![candidate("light", 1.0, 0), candidate("heavy", 9.0, 1)],
            &policy,
            &mut rng,
        );
        assert_eq!(ordered.len(), 2);
        if ordered[0].name == "heavy" {
            heavy_first += 1;
        }
    }

    assert!(heavy_first > 820, "heavy first {heavy_first} times");
    assert!(heavy_first < 980, "heavy first {heavy_first} times");

    // Zero weights never win a draw against positive ones
    let ordered = order_candidates(
        vec![candidate("zero", 0.0, 0), candidate("one", 1.0, 1)],
        &policy,
        &mut rng,
    );
    assert_eq!(ordered[0].name, "one");
    assert_eq!(ordered[1].name, "zero");
}

#[tokio::test]
async fn test_fallback_on_failure() {
    let router = router(RoutingStrategy::Failover);
    let primary = add(
        &router,
        MockProvider::new("primary").failing(unavailable()),
        ProviderConfig::new().with_fallback_order(0),
    )
    .await;
    let backup = add(
        &router,
        MockProvider::new("backup").with_response("from backup"),
        ProviderConfig::new().with_fallback_order(1),
    )
    .await;

    let response = assert_ok!(router.route_request(&messages(), &generation(), None).await);
    assert_eq!(response.provider, "backup");
    assert_eq!(response.content, "from backup");
    assert!(response.response_time.is_some());
    assert_eq!(primary.call_count(), 1);
    assert_eq!(backup.call_count(), 1);
}

#[tokio::test]
async fn test_cost_optimized_end_to_end() {
    let router = router(RoutingStrategy::CostOptimized);
    add(
        &router,
        MockProvider::new("A").with_cost(0.001),
        ProviderConfig::new().with_priority(1),
    )
    .await;
    add(
        &router,
        MockProvider::new("B").with_cost(0.01),
        ProviderConfig::new().with_priority(10),
    )
    .await;

    let response = assert_ok!(router.route_request(&messages(), &generation(), None).await);
    assert_eq!(response.provider, "A");
}

#[tokio::test]
async fn test_failover_end_to_end_records_one_error() {
    let router = router(RoutingStrategy::Failover);
    add(
        &router,
        MockProvider::new("primary").failing(Error::Api("429 rate limit exceeded".into())),
        ProviderConfig::new().with_fallback_order(0),
    )
    .await;
    add(&router, MockProvider::new("backup"), ProviderConfig::new().with_fallback_order(1)).await;

    let response = assert_ok!(router.route_request(&messages(), &generation(), None).await);
    assert_eq!(response.provider, "backup");

    let status = router.provider_status().await;
    assert_eq!(status["primary"].error_count, 1);
    assert_eq!(status["backup"].error_count, 0);
    assert_eq!(status["backup"].recent_requests, 1);
}

#[tokio::test]
async fn test_breaker_trips_after_six_errors() {
    let router = router(RoutingStrategy::CostOptimized);
    let broken = add(
        &router,
        MockProvider::new("broken").failing(unavailable()),
        ProviderConfig::new(),
    )
    .await;

    let policy = RoutingPolicy::default().with_retry_attempts(10);
    let err = assert_err!(router.route_request(&messages(), &generation(), Some(&policy)).await);
    assert!(err.to_string().contains("503"));

    assert_eq!(broken.call_count(), 6);
    let status = router.provider_status().await;
    assert_eq!(status["broken"].circuit_state, CircuitState::Open);
    assert_eq!(status["broken"].error_count, 6);

    router.reset_circuit_breakers();
    let status = router.provider_status().await;
    assert_eq!(status["broken"].circuit_state, CircuitState::Closed);
    assert_eq!(status["broken"].error_count, 0);
}

#[tokio::test]
async fn test_breaker_recovers_through_single_trial() {
    let router = router(RoutingStrategy::CostOptimized)
        .with_breaker_recovery(Duration::from_millis(20));
    // Six failures trip the breaker, the seventh is a failed trial
    let provider = add(
        &router,
        MockProvider::new("shaky").failing_times(7, unavailable()),
        ProviderConfig::new(),
    )
    .await;

    let trip = RoutingPolicy::default().with_retry_attempts(6);
    assert_err!(router.route_request(&messages(), &generation(), Some(&trip)).await);
    assert_eq!(provider.call_count(), 6);
    assert_eq!(router.provider_status().await["shaky"].circuit_state, CircuitState::Open);

    // Open: skipped without a call
    let once = RoutingPolicy::default().with_retry_attempts(1);
    let err = assert_err!(router.route_request(&messages(), &generation(), Some(&once)).await);
    assert!(matches!(err, Error::AllProvidersFailed));
    assert_eq!(provider.call_count(), 6);

    // Half-open admits one trial; its failure reopens the breaker for the
    // remaining passes, whose backoff stays under the recovery timeout
    tokio::time::sleep(Duration::from_millis(30)).await;
    let passes = RoutingPolicy::default().with_retry_attempts(3);
    assert_err!(router.route_request(&messages(), &generation(), Some(&passes)).await);
    assert_eq!(provider.call_count(), 7);
    assert_eq!(router.provider_status().await["shaky"].circuit_state, CircuitState::Open);

    assert_err!(router.route_request(&messages(), &generation(), Some(&once)).await);
    assert_eq!(provider.call_count(), 7);

    // A successful trial closes the breaker and clears the error count
    tokio::time::sleep(Duration::from_millis(30)).await;
    let response = assert_ok!(router.route_request(&messages(), &generation(), Some(&once)).await);
    assert_eq!(response.provider, "shaky");
    assert_eq!(provider.call_count(), 8);

    let status = router.provider_status().await;
    assert_eq!(status["shaky"].circuit_state, CircuitState::Closed);
    assert_eq!(status["shaky"].error_count, 0);
}

#[tokio::test]
async fn test_retry_passes_recover_transient_failure() {
    let router = router(RoutingStrategy::CostOptimized);
    let flaky = add(
        &router,
        MockProvider::new("flaky").failing_times(2, Error::Timeout(10)),
        ProviderConfig::new(),
    )
    .await;

    let response = assert_ok!(router.route_request(&messages(), &generation(), None).await);
    assert_eq!(response.provider, "flaky");
    assert_eq!(flaky.call_count(), 3);
}

#[tokio::test]
async fn test_no_eligible_providers() {
    let router = router(RoutingStrategy::CostOptimized);
    let err = assert_err!(router.route_request(&messages(), &generation(), None).await);
    assert!(matches!(err, Error::NoEligibleProviders { ref model } if model == "mock-model"));

    add(&router, MockProvider::new("costly").with_cost(5.0), ProviderConfig::new()).await;
    let err = assert_err!(router.route_request(&messages(), &generation(), None).await);
    assert!(matches!(err, Error::NoEligibleProviders { .. }));
}

#[tokio::test]
async fn test_rate_limited_providers_are_skipped() {
    let router = router(RoutingStrategy::CostOptimized);
    add(
        &router,
        MockProvider::new("tiny"),
        ProviderConfig::new().with_max_requests_per_minute(1),
    )
    .await;

    let policy = RoutingPolicy::default().with_retry_attempts(1);
    assert_ok!(router.route_request(&messages(), &generation(), Some(&policy)).await);

    let err = assert_err!(router.route_request(&messages(), &generation(), Some(&policy)).await);
    assert!(matches!(err, Error::AllProvidersFailed));
}

#[tokio::test]
async fn test_fallback_disabled_tries_only_first() {
    let router = router(RoutingStrategy::Failover);
    add(
        &router,
        MockProvider::new("primary").failing(unavailable()),
        ProviderConfig::new().with_fallback_order(0),
    )
    .await;
    let backup = add(&router, MockProvider::new("backup"), ProviderConfig::new().with_fallback_order(1)).await;

    let policy = RoutingPolicy::new(RoutingStrategy::Failover)
        .with_fallback(false)
        .with_retry_attempts(2);
    assert_err!(router.route_request(&messages(), &generation(), Some(&policy)).await);
    assert_eq!(backup.call_count(), 0);
}

#[tokio::test]
async fn test_add_provider_lifecycle() {
    let router = router(RoutingStrategy::CostOptimized);

    let broken = Arc::new(MockProvider::new("broken").with_init_error(Error::Api("no key".into())));
    assert_err!(router.add_provider(broken, ProviderConfig::new()).await);
    assert!(!router.has_provider("broken"));

    let first = add(&router, MockProvider::new("first"), ProviderConfig::new()).await;
    assert!(first.is_initialized());
    add(&router, MockProvider::new("second"), ProviderConfig::new()).await;
    add(&router, MockProvider::new("first"), ProviderConfig::new().with_priority(4)).await;

    assert_eq!(router.list_providers(), vec!["first", "second"]);
    assert_eq!(router.provider_config("first").unwrap().priority, 4);

    assert!(router.remove_provider("first"));
    assert!(!router.remove_provider("first"));
    assert_eq!(router.list_providers(), vec!["second"]);

    let invalid = ProviderConfig::new().with_weight(0.0);
    assert_err!(router.add_provider(Arc::new(MockProvider::new("zero")), invalid).await);
}

#[tokio::test]
async fn test_admin_updates() {
    let router = router(RoutingStrategy::CostOptimized);
    add(&router, MockProvider::new("grok"), ProviderConfig::new()).await;

    let update = ProviderConfigUpdate {
        weight: Some(2.5),
        fallback_order: Some(3),
        ..Default::default()
    };
    assert_ok!(router.update_provider_config("grok", &update));
    let config = router.provider_config("grok").unwrap();
    assert_eq!(config.weight, 2.5);
    assert_eq!(config.fallback_order, 3);

    let err = assert_err!(router.update_provider_config("nope", &update));
    assert!(matches!(err, Error::UnknownProvider(_)));

    let bad = ProviderConfigUpdate {
        max_requests_per_minute: Some(0),
        ..Default::default()
    };
    let err = assert_err!(router.update_provider_config("grok", &bad));
    assert!(matches!(err, Error::InvalidConfig { .. }));

    assert_ok!(router.disable_provider("grok"));
    assert!(router.candidate_order(&messages(), &generation(), None).is_empty());
    assert_ok!(router.enable_provider("grok"));
    assert_eq!(router.candidate_order(&messages(), &generation(), None), vec!["grok"]);
    assert!(matches!(
        router.enable_provider("nope"),
        Err(Error::UnknownProvider(_))
    ));

    let err = assert_err!(router.update_default_policy(RoutingPolicy::default().with_retry_attempts(0)));
    assert!(matches!(err, Error::InvalidPolicy(_)));
    assert_ok!(router.update_default_policy(RoutingPolicy::new(RoutingStrategy::Failover)));
    assert_eq!(router.default_policy().strategy, RoutingStrategy::Failover);
}

#[tokio::test]
async fn test_snapshot_and_load_configuration() {
    let router = router(RoutingStrategy::CostOptimized);
    add(&router, MockProvider::new("grok"), ProviderConfig::new().with_priority(3)).await;
    add(&router, MockProvider::new("claude"), ProviderConfig::new()).await;

    let snapshot = router.configuration_snapshot();
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["default_policy"]["strategy"], "cost_optimized");
    assert_eq!(json["providers"]["grok"]["priority"], 3);

    assert_ok!(router.disable_provider("grok"));
    assert_ok!(router.update_default_policy(RoutingPolicy::new(RoutingStrategy::RoundRobin)));

    let mut configuration = RouterConfiguration::from(snapshot.clone());
    configuration
        .providers
        .insert("unregistered".to_string(), ProviderConfigUpdate::default());
    assert_ok!(router.load_configuration(&configuration));
    assert_eq!(router.configuration_snapshot(), snapshot);

    let parsed: RouterConfiguration = serde_json::from_value(json).unwrap();
    assert_ok!(router.load_configuration(&parsed));
}

#[tokio::test]
async fn test_load_configuration_validates_before_applying() {
    let router = router(RoutingStrategy::CostOptimized);
    add(&router, MockProvider::new("grok"), ProviderConfig::new()).await;

    let configuration = RouterConfiguration::from_json(
        r#"{
            "default_policy": {"strategy": "failover"},
            "providers": {"grok": {"priority": -1}}
        }"#,
    )
    .unwrap();

    assert_err!(router.load_configuration(&configuration));
    assert_eq!(router.default_policy().strategy, RoutingStrategy::CostOptimized);
    assert_eq!(router.provider_config("grok").unwrap().priority, 1);
}

#[tokio::test]
async fn test_provider_status_and_validation() {
    let router = router(RoutingStrategy::CostOptimized);
    add(&router, MockProvider::new("grok"), ProviderConfig::new().with_weight(2.0)).await;
    add(
        &router,
        MockProvider::new("local")
            .with_unhealthy("model not loaded")
            .with_invalid_api_key(),
        ProviderConfig::new(),
    )
    .await;

    let status = router.provider_status().await;
    assert_eq!(status["grok"].health.status, HealthState::Healthy);
    assert_eq!(status["grok"].weight, 2.0);
    assert_eq!(status["grok"].average_latency, None);
    assert_eq!(status["local"].health.status, HealthState::Unhealthy);

    let json = serde_json::to_value(&status["local"]).unwrap();
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["message"], "model not loaded");
    assert_eq!(json["circuit_state"], "closed");

    let validation = router.validate_providers().await;
    assert_eq!(validation["grok"], true);
    assert_eq!(validation["local"], false);
}

#[tokio::test]
async fn test_stream_falls_back_on_start_failure() {
    let router = router(RoutingStrategy::Failover);
    add(
        &router,
        MockProvider::new("primary").failing(unavailable()),
        ProviderConfig::new().with_fallback_order(0),
    )
    .await;
    add(
        &router,
        MockProvider::new("backup").with_stream_chunks(&["Hello", ", ", "Steve"]),
        ProviderConfig::new().with_fallback_order(1),
    )
    .await;

    let stream = assert_ok!(router.stream_request(&messages(), &generation(), None).await);
    let chunks: Vec<String> = stream.map(|chunk| chunk.unwrap()).collect().await;
    assert_eq!(chunks.concat(), "Hello, Steve");
}

#[tokio::test]
async fn test_stream_mid_stream_error_surfaces() {
    let router = router(RoutingStrategy::Failover);
    add(
        &router,
        MockProvider::new("primary")
            .with_stream_chunks(&["partial"])
            .with_mid_stream_error(Error::Network("connection reset".into())),
        ProviderConfig::new().with_fallback_order(0),
    )
    .await;
    let backup = add(&router, MockProvider::new("backup"), ProviderConfig::new().with_fallback_order(1)).await;

    let stream = assert_ok!(router.stream_request(&messages(), &generation(), None).await);
    let items: Vec<_> = stream.collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_deref().unwrap(), "partial");
    assert!(matches!(items[1], Err(Error::Network(_))));
    assert_eq!(backup.call_count(), 0);
}
