// Router and handler set with custom handlers

use mcp_gateway::core::capabilities::{CapabilityRegistry, ModelCapabilities};
use mcp_gateway::core::errors::GatewayError;
use mcp_gateway::core::models::{McpRequest, ModelType};
use mcp_gateway::engine::handlers::HandlerSet;
use mcp_gateway::engine::router::{check_batch_size, ModelRouter, MAX_BATCH_SIZE};
use mcp_gateway::metrics::GatewayMetrics;
use std::sync::Arc;
use std::time::Duration;

use super::common::{ErroringHandler, PanickingHandler};

fn router_with(handlers: HandlerSet) -> ModelRouter {
    ModelRouter::new(handlers, Arc::new(CapabilityRegistry::builtin()))
}

#[tokio::test]
async fn test_batch_survives_panics_and_errors() {
    let mut handlers = HandlerSet::builtin(Duration::ZERO);
    handlers.register(Arc::new(PanickingHandler { model: ModelType::Debugger }));
    handlers.register(Arc::new(ErroringHandler { model: ModelType::Aiden7b }));
    let metrics = Arc::new(GatewayMetrics::new().unwrap());
    let router = router_with(handlers).with_metrics(metrics.clone());

    let batch = vec![
        McpRequest::new(ModelType::Debugger, "a").unwrap().with_request_id("a"),
        McpRequest::new(ModelType::Codegen, "b").unwrap().with_request_id("b"),
        McpRequest::new(ModelType::Aiden7b, "c").unwrap().with_request_id("c"),
    ];
    let responses = router.dispatch_batch(batch).await.unwrap();

    let flags: Vec<bool> = responses.iter().map(|r| r.success).collect();
    assert_eq!(flags, vec![false, true, false]);
    assert!(responses.iter().all(|r| r.processing_time >= 0.0));
    assert_eq!(router.request_count(), 3);

    let rendered = metrics.render().unwrap();
    assert!(rendered.contains("outcome=\"failure\""));
}

#[tokio::test]
async fn test_custom_capabilities_drive_clamp() {
    let mut codegen = CapabilityRegistry::builtin().get(ModelType::Codegen).unwrap().clone();
    codegen.max_tokens = 100;
    let capabilities = CapabilityRegistry::from_entries(vec![codegen]);
    let router = ModelRouter::new(HandlerSet::builtin(Duration::ZERO), Arc::new(capabilities));

    let request = McpRequest::new(ModelType::Codegen, "x").unwrap();
    let response = router.dispatch(request).await.unwrap();
    assert_eq!(response.metadata["max_tokens"], 100);

    // No descriptor means the model cannot be routed
    let request = McpRequest::new(ModelType::Debugger, "x").unwrap();
    assert!(matches!(
        router.dispatch(request).await,
        Err(GatewayError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_empty_batch_is_fine() {
    let router = router_with(HandlerSet::builtin(Duration::ZERO));
    assert!(router.dispatch_batch(Vec::new()).await.unwrap().is_empty());
}

#[test]
fn test_batch_size_limit() {
    assert!(check_batch_size(MAX_BATCH_SIZE).is_ok());
    assert!(check_batch_size(MAX_BATCH_SIZE + 1).is_err());
}

#[test]
fn test_stats_serializes() {
    let router = router_with(HandlerSet::builtin(Duration::ZERO));
    let stats = serde_json::to_value(router.stats()).unwrap();
    assert_eq!(stats["supported_models"][0], "aiden-7b");
    let codegen: ModelCapabilities =
        serde_json::from_value(stats["model_capabilities"]["codegen"].clone()).unwrap();
    assert_eq!(codegen.max_tokens, 8192);
}
