// Common test utilities and helpers for all test modules
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use mcp_gateway::api::{create_router, AppState};
use mcp_gateway::auth::key_registry::{ApiKeyRecord, KeyRegistry};
use mcp_gateway::config::Config;
use mcp_gateway::core::errors::GatewayError;
use mcp_gateway::core::models::{McpRequest, ModelType};
use mcp_gateway::engine::handlers::{HandlerSet, ModelHandler};
use mcp_gateway::state::memory_store::MemoryWindowStore;
use mcp_gateway::state::{WindowDecision, WindowStore};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Key with read and write permissions and a quota of 5
pub const WRITER_KEY: &str = "test-writer-key";
/// Key with read permission only
pub const READER_KEY: &str = "test-reader-key";
pub const WRITER_QUOTA: u32 = 5;

/// Window store whose every call fails, like an unreachable Redis
#[derive(Default)]
pub struct FailingWindowStore {
    pub calls: AtomicU32,
}

impl FailingWindowStore {
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WindowStore for FailingWindowStore {
    async fn admit(&self, _: &str, _: u32, _: u64, _: f64) -> Result<WindowDecision, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GatewayError::BackendUnavailable("connection refused".to_string()))
    }

    async fn remaining(&self, _: &str, _: u32, _: u64, _: f64) -> Result<u32, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GatewayError::BackendUnavailable("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        Err(GatewayError::BackendUnavailable("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Window store that answers like Redis until switched off
#[derive(Default)]
pub struct SwitchableWindowStore {
    inner: MemoryWindowStore,
    down: AtomicBool,
}

impl SwitchableWindowStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), GatewayError> {
        if self.down.load(Ordering::SeqCst) {
            Err(GatewayError::BackendUnavailable("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WindowStore for SwitchableWindowStore {
    async fn admit(&self, client_id: &str, quota: u32, window_secs: u64, now: f64) -> Result<WindowDecision, GatewayError> {
        self.check()?;
        self.inner.admit(client_id, quota, window_secs, now).await
    }

    async fn remaining(&self, client_id: &str, quota: u32, window_secs: u64, now: f64) -> Result<u32, GatewayError> {
        self.check()?;
        self.inner.remaining(client_id, quota, window_secs, now).await
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        self.check()
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Handler that panics on every request
pub struct PanickingHandler {
    pub model: ModelType,
}

#[async_trait]
impl ModelHandler for PanickingHandler {
    fn model(&self) -> ModelType {
        self.model
    }

    async fn handle(&self, _request: &McpRequest) -> Result<String, GatewayError> {
        panic!("handler blew up")
    }
}

/// Handler that reports an error without panicking
pub struct ErroringHandler {
    pub model: ModelType,
}

#[async_trait]
impl ModelHandler for ErroringHandler {
    fn model(&self) -> ModelType {
        self.model
    }

    async fn handle(&self, _request: &McpRequest) -> Result<String, GatewayError> {
        Err(GatewayError::HandlerError("model offline".to_string()))
    }
}

pub fn test_registry(config: &Config) -> Arc<KeyRegistry> {
    let registry = KeyRegistry::new(config.api_key_salt.clone(), config.default_rate_limit);
    registry.add(
        WRITER_KEY,
        ApiKeyRecord::new("Writer", WRITER_QUOTA, ["read", "write"]).unwrap(),
    );
    registry.add(READER_KEY, ApiKeyRecord::new("Reader", 100, ["read"]).unwrap());
    Arc::new(registry)
}

pub fn test_state_with(
    config: Config,
    primary: Option<Arc<dyn WindowStore>>,
    handlers: HandlerSet,
) -> AppState {
    let registry = test_registry(&config);
    AppState::with_parts(config, registry, primary, handlers).unwrap()
}

pub fn test_state() -> AppState {
    test_state_with(Config::test_config(), None, HandlerSet::builtin(Duration::ZERO))
}

pub fn test_app() -> Router {
    create_router(test_state())
}

pub fn get(uri: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, api_key: Option<&str>, body: &Value) -> Request<Body> {
    post_raw(uri, api_key, body.to_string())
}

pub fn post_raw(uri: &str, api_key: Option<&str>, body: impl Into<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::from(body.into())).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn header_u64(response: &Response, name: &str) -> u64 {
    response.headers()[name].to_str().unwrap().parse().unwrap()
}
