//! Integration tests for Steve's Mom
//!
//! These tests verify the integration between the two crates:
//! - stevesmom-core: Sessions and context windows
//! - stevesmom-llm: Provider routing and resilience

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use stevesmom_core::{ContextConfig, ContextManager};
use stevesmom_llm::{
    create_router_from_env, CircuitState, Error as LlmError, ExponentialBackoff,
    GenerationConfig, LlmProvider, MessageRole, MockProvider, ModelRouter, ProviderConfig,
    RateLimiter, RateLimiterConfig, ResolvedProvider, RouterConfiguration, RouterSettings,
    RoutingPolicy, RoutingStrategy, StaticResolver,
};
use tokio_test::assert_ok;

fn fast_router(strategy: RoutingStrategy) -> ModelRouter {
    ModelRouter::new(RoutingPolicy::new(strategy)).with_retry_backoff(
        ExponentialBackoff::new()
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(false),
    )
}

// ============================================================================
// Context -> Router
// ============================================================================

/// One conversational turn: window in, reply recorded
async fn turn(
    manager: &ContextManager,
    router: &ModelRouter,
    session_id: &str,
    text: &str,
) -> stevesmom_core::Result<String> {
    manager
        .add_message(session_id, MessageRole::User, text, None)
        .await?;
    let window = manager.get_context_window(session_id, None).await?;
    let response = router
        .route_request(&window.messages, &GenerationConfig::new("mock-model"), None)
        .await?;
    manager
        .add_message(session_id, MessageRole::Assistant, response.content.clone(), None)
        .await?;
    Ok(response.content)
}

#[tokio::test]
async fn test_conversation_flows_through_router() {
    let manager = ContextManager::new(ContextConfig::default()).unwrap();
    let router = fast_router(RoutingStrategy::CostOptimized);

    let pricey = Arc::new(MockProvider::new("pricey").with_cost(0.05));
    let cheap = Arc::new(MockProvider::new("cheap").with_cost(0.002).with_response("eat your vegetables"));
    assert_ok!(router.add_provider(pricey.clone(), ProviderConfig::new()).await);
    assert_ok!(router.add_provider(cheap.clone(), ProviderConfig::new()).await);

    let session_id = manager.create_session("steve", None, None).await.unwrap();
    manager
        .add_message(&session_id, MessageRole::System, "You are Steve's mom.", None)
        .await
        .unwrap();

    let reply = turn(&manager, &router, &session_id, "what's for dinner?").await.unwrap();
    assert_eq!(reply, "eat your vegetables");
    assert_eq!(cheap.call_count(), 1);
    assert_eq!(pricey.call_count(), 0);

    let messages = manager.get_messages(&session_id).await.unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2].role, MessageRole::Assistant);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_router_failure_surfaces_as_core_error() {
    let manager = ContextManager::new(ContextConfig::default()).unwrap();
    let router = fast_router(RoutingStrategy::Priority);
    let session_id = manager.create_session("steve", None, None).await.unwrap();

    let err = turn(&manager, &router, &session_id, "anyone home?")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        stevesmom_core::Error::Llm(LlmError::NoEligibleProviders { .. })
    ));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_failover_keeps_conversation_going() {
    let manager = ContextManager::new(ContextConfig::default()).unwrap();
    let router = fast_router(RoutingStrategy::Failover);

    let primary = Arc::new(
        MockProvider::new("primary").failing(LlmError::Api("503 Service Unavailable".into())),
    );
    let backup = Arc::new(MockProvider::new("backup").with_response("still here, sweetie"));
    assert_ok!(
        router
            .add_provider(primary.clone(), ProviderConfig::new().with_fallback_order(0))
            .await
    );
    assert_ok!(
        router
            .add_provider(backup.clone(), ProviderConfig::new().with_fallback_order(1))
            .await
    );

    let session_id = manager.create_session("steve", None, None).await.unwrap();
    for _ in 0..3 {
        let reply = turn(&manager, &router, &session_id, "hello?").await.unwrap();
        assert_eq!(reply, "still here, sweetie");
    }

    let status = router.provider_status().await;
    assert_eq!(status["primary"].error_count, 3);
    assert_eq!(status["primary"].circuit_state, CircuitState::Closed);
    assert_eq!(status["backup"].error_count, 0);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_truncated_window_is_routed() {
    let config = ContextConfig::default().with_max_context_tokens(40);
    let manager = ContextManager::new(config).unwrap();
    let router = fast_router(RoutingStrategy::Priority);
    assert_ok!(
        router
            .add_provider(Arc::new(MockProvider::new("mom")), ProviderConfig::new())
            .await
    );

    let session_id = manager.create_session("steve", None, None).await.unwrap();
    for i in 0..8 {
        turn(&manager, &router, &session_id, &format!("question number {i}"))
            .await
            .unwrap();
    }

    let window = manager.get_context_window(&session_id, None).await.unwrap();
    assert!(window.truncated);
    assert!(window.total_tokens <= 40);
    assert_eq!(window.messages.last().unwrap().text(), "mock response");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_streaming_a_context_window() {
    let manager = ContextManager::new(ContextConfig::default()).unwrap();
    let router = fast_router(RoutingStrategy::Priority);
    assert_ok!(
        router
            .add_provider(
                Arc::new(MockProvider::new("mom").with_stream_chunks(&["clean ", "your ", "room"])),
                ProviderConfig::new(),
            )
            .await
    );

    let session_id = manager.create_session("steve", None, None).await.unwrap();
    manager
        .add_message(&session_id, MessageRole::User, "what should I do today?", None)
        .await
        .unwrap();
    let window = manager.get_context_window(&session_id, None).await.unwrap();

    let stream = router
        .stream_request(&window.messages, &GenerationConfig::new("mock-model"), None)
        .await
        .unwrap();
    let chunks: Vec<String> = stream.map(|chunk| chunk.unwrap()).collect().await;
    assert_eq!(chunks.concat(), "clean your room");

    manager.shutdown().await;
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_router_from_settings_and_resolver() {
    let settings = RouterSettings::from_lookup(|key| match key {
        "ROUTING_STRATEGY" => Some("priority".to_string()),
        "MAX_LATENCY_MS" => Some("5000".to_string()),
        _ => None,
    })
    .unwrap();

    let local: Arc<dyn LlmProvider> = Arc::new(MockProvider::new("local"));
    let cloud: Arc<dyn LlmProvider> = Arc::new(MockProvider::new("cloud"));
    let resolver = StaticResolver::new(vec![
        ResolvedProvider::new(cloud, 2),
        ResolvedProvider::new(local, 1),
    ]);

    let router = create_router_from_env(&settings, &resolver).await.unwrap();
    let policy = router.default_policy();
    assert_eq!(policy.strategy, RoutingStrategy::Priority);
    assert_eq!(policy.max_latency_threshold, 5.0);

    assert_eq!(router.provider_config("local").unwrap().priority, 9);
    assert_eq!(router.provider_config("cloud").unwrap().priority, 8);

    let response = router
        .route_request(
            &[stevesmom_llm::Message::user("hi")],
            &GenerationConfig::new("mock-model"),
            None,
        )
        .await
        .unwrap();
    assert_eq!(response.provider, "local");
}

#[tokio::test]
async fn test_snapshot_round_trips_through_json() {
    let router = fast_router(RoutingStrategy::Priority);
    assert_ok!(
        router
            .add_provider(
                Arc::new(MockProvider::new("mom")),
                ProviderConfig::new().with_priority(4).with_enabled(false),
            )
            .await
    );

    let json = serde_json::to_string(&router.configuration_snapshot()).unwrap();
    let configuration = RouterConfiguration::from_json(&json).unwrap();
    assert_ok!(configuration.validate());

    let other = fast_router(RoutingStrategy::CostOptimized);
    assert_ok!(
        other
            .add_provider(Arc::new(MockProvider::new("mom")), ProviderConfig::new())
            .await
    );
    assert_ok!(other.load_configuration(&configuration));

    assert_eq!(other.default_policy().strategy, RoutingStrategy::Priority);
    let config = other.provider_config("mom").unwrap();
    assert_eq!(config.priority, 4);
    assert!(!config.enabled);
}

// ============================================================================
// Resilience
// ============================================================================

#[tokio::test]
async fn test_rate_limiter_wraps_provider_calls() {
    let provider = MockProvider::new("mom")
        .failing_times(1, LlmError::Api("429 Too Many Requests".into()));
    let limiter = RateLimiter::new(
        "mom",
        RateLimiterConfig::default().with_backoff(
            ExponentialBackoff::new()
                .with_base_delay(Duration::from_millis(1))
                .with_jitter(false),
        ),
    );
    let messages = vec![stevesmom_llm::Message::user("hi")];
    let config = GenerationConfig::new("mock-model");

    let response = limiter
        .execute(|| provider.generate_response(&messages, &config))
        .await
        .unwrap();
    assert_eq!(response.content, "mock response");
    assert_eq!(provider.call_count(), 2);

    let stats = limiter.stats();
    assert_eq!(stats.provider, "mom");
    assert_eq!(stats.circuit_state, CircuitState::Closed);
    assert_eq!(stats.failure_count, 0);
}
