// Pluggable per-model handlers and the built-in template handlers

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::core::errors::GatewayError;
use crate::core::models::{McpRequest, ModelType};
use crate::engine::templates;

/// Permission the built-in handlers require from the calling key
pub const DEFAULT_HANDLER_PERMISSION: &str = "write";

/// Produces response text for one model type
#[async_trait]
pub trait ModelHandler: Send + Sync {
    fn model(&self) -> ModelType;

    fn required_permission(&self) -> &str {
        DEFAULT_HANDLER_PERMISSION
    }

    async fn handle(&self, request: &McpRequest) -> Result<String, GatewayError>;
}

/// Handler table keyed by model type
#[derive(Clone, Default)]
pub struct HandlerSet {
    handlers: HashMap<ModelType, Arc<dyn ModelHandler>>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three template handlers, each sleeping `latency` to simulate inference
    pub fn builtin(latency: Duration) -> Self {
        let mut set = Self::new();
        set.register(Arc::new(GeneralHandler { latency }));
        set.register(Arc::new(CodegenHandler { latency }));
        set.register(Arc::new(DebuggerHandler { latency }));
        set
    }

    /// Register a handler; returns the one it replaced, if any
    pub fn register(&mut self, handler: Arc<dyn ModelHandler>) -> Option<Arc<dyn ModelHandler>> {
        self.handlers.insert(handler.model(), handler)
    }

    pub fn get(&self, model: ModelType) -> Option<&Arc<dyn ModelHandler>> {
        self.handlers.get(&model)
    }

    /// Registered models, in `ModelType::ALL` order
    pub fn models(&self) -> Vec<ModelType> {
        ModelType::ALL
            .into_iter()
            .filter(|m| self.handlers.contains_key(m))
            .collect()
    }
}

fn language_of(request: &McpRequest) -> &str {
    request.context_str("language").unwrap_or("python")
}

async fn simulate(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

/// General-purpose model: picks a template from the prompt's keywords
pub struct GeneralHandler {
    pub latency: Duration,
}

#[async_trait]
impl ModelHandler for GeneralHandler {
    fn model(&self) -> ModelType {
        ModelType::Aiden7b
    }

    async fn handle(&self, request: &McpRequest) -> Result<String, GatewayError> {
        info!(request_id = %request.request_id(), "Processing with general model");
        simulate(self.latency).await;

        let prompt = request.prompt();
        let language = language_of(request);
        let text = if templates::is_debugging_prompt(prompt) {
            templates::debugging_response(prompt, language)
        } else if templates::is_generation_prompt(prompt) {
            templates::code_response(prompt, language)
        } else {
            templates::general_response(prompt, language)
        };
        Ok(text)
    }
}

/// Code generation model
pub struct CodegenHandler {
    pub latency: Duration,
}

#[async_trait]
impl ModelHandler for CodegenHandler {
    fn model(&self) -> ModelType {
        ModelType::Codegen
    }

    async fn handle(&self, request: &McpRequest) -> Result<String, GatewayError> {
        info!(request_id = %request.request_id(), "Processing with codegen model");
        simulate(self.latency).await;
        Ok(templates::advanced_code_response(request.prompt(), language_of(request)))
    }
}

/// Debugging model: analyses the optional `code` context entry
pub struct DebuggerHandler {
    pub latency: Duration,
}

#[async_trait]
impl ModelHandler for DebuggerHandler {
    fn model(&self) -> ModelType {
        ModelType::Debugger
    }

    async fn handle(&self, request: &McpRequest) -> Result<String, GatewayError> {
        info!(request_id = %request.request_id(), "Processing with debugger model");
        simulate(self.latency).await;
        Ok(templates::debugging_analysis(
            request.prompt(),
            language_of(request),
            request.context_str("code"),
        ))
    }
}
