// Request router: validation, clamping, dispatch and envelope shaping

use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::auth::key_registry::ApiKeyRecord;
use crate::core::capabilities::{CapabilityRegistry, ModelCapabilities};
use crate::core::errors::GatewayError;
use crate::core::models::{McpRequest, McpResponse, ModelType};
use crate::engine::handlers::HandlerSet;
use crate::metrics::GatewayMetrics;

/// Largest batch accepted by `dispatch_batch`
pub const MAX_BATCH_SIZE: usize = 10;

/// Router statistics
#[derive(Debug, Clone, Serialize)]
pub struct RouterStats {
    pub total_requests: u64,
    pub supported_models: Vec<ModelType>,
    pub model_capabilities: BTreeMap<String, ModelCapabilities>,
}

/// Routes validated requests to their model handler
pub struct ModelRouter {
    handlers: HandlerSet,
    capabilities: Arc<CapabilityRegistry>,
    request_count: AtomicU64,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl ModelRouter {
    pub fn new(handlers: HandlerSet, capabilities: Arc<CapabilityRegistry>) -> Self {
        Self {
            handlers,
            capabilities,
            request_count: AtomicU64::new(0),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// Check that `record` may call `model`
    pub fn authorize(&self, model: ModelType, record: &ApiKeyRecord) -> Result<(), GatewayError> {
        let handler = self.handlers.get(model).ok_or_else(|| unsupported(model))?;
        let permission = handler.required_permission();
        if record.has_permission(permission) {
            Ok(())
        } else {
            Err(GatewayError::PermissionDenied(permission.to_string()))
        }
    }

    /// Dispatch one request
    ///
    /// Only an unknown model is returned as `Err` (a `ValidationError`); every
    /// handler failure, including a panic, becomes a `success=false` envelope.
    pub async fn dispatch(&self, mut request: McpRequest) -> Result<McpResponse, GatewayError> {
        let start = Instant::now();
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let model = request.model();
        info!(request_id = %request.request_id(), model = %model, "Routing request");

        let handler = self.handlers.get(model).ok_or_else(|| unsupported(model))?;
        let capabilities = self.capabilities.get(model).ok_or_else(|| {
            GatewayError::ValidationError(format!("No capabilities defined for model: {}", model))
        })?;

        let requested = request.max_tokens();
        if request.clamp_max_tokens(capabilities.max_tokens) {
            warn!(
                request_id = %request.request_id(),
                model = %model,
                requested,
                ceiling = capabilities.max_tokens,
                "Reduced max_tokens to model ceiling"
            );
        }

        let outcome = AssertUnwindSafe(handler.handle(&request)).catch_unwind().await;
        let processing_time = start.elapsed().as_secs_f64();

        let response = match outcome {
            Ok(Ok(text)) => {
                let mut metadata = Map::new();
                metadata.insert(
                    "model_capabilities".to_string(),
                    serde_json::to_value(capabilities).unwrap_or(Value::Null),
                );
                metadata.insert("input_tokens".to_string(), Value::from(word_count(request.prompt())));
                metadata.insert("output_tokens".to_string(), Value::from(word_count(&text)));
                metadata.insert("temperature".to_string(), Value::from(request.temperature()));
                metadata.insert("max_tokens".to_string(), Value::from(request.max_tokens()));

                info!(
                    request_id = %request.request_id(),
                    processing_time_ms = (processing_time * 1000.0) as u64,
                    "Request processed successfully"
                );

                McpResponse {
                    request_id: request.request_id().to_string(),
                    model,
                    response: text,
                    metadata,
                    processing_time,
                    success: true,
                }
            }
            Ok(Err(e)) => {
                error!(request_id = %request.request_id(), error = %e, "Handler failed");
                McpResponse::failure(request.request_id(), model, &as_handler_error(e), processing_time)
            }
            Err(panic) => {
                let e = GatewayError::HandlerError(panic_message(panic.as_ref()));
                error!(request_id = %request.request_id(), error = %e, "Handler panicked");
                McpResponse::failure(request.request_id(), model, &e, processing_time)
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_dispatch(model.as_str(), response.success);
        }
        Ok(response)
    }

    /// Dispatch up to `MAX_BATCH_SIZE` requests sequentially, in input order
    ///
    /// A failing item yields its own `success=false` envelope; only an
    /// oversized batch is rejected outright.
    pub async fn dispatch_batch(&self, requests: Vec<McpRequest>) -> Result<Vec<McpResponse>, GatewayError> {
        check_batch_size(requests.len())?;

        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            let request_id = request.request_id().to_string();
            let model = request.model();
            let response = match self.dispatch(request).await {
                Ok(response) => response,
                Err(e) => McpResponse::failure(&request_id, model, &e, 0.0),
            };
            responses.push(response);
        }
        Ok(responses)
    }

    /// Requests seen since startup, including rejected ones
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> RouterStats {
        RouterStats {
            total_requests: self.request_count(),
            supported_models: self.handlers.models(),
            model_capabilities: self
                .capabilities
                .all()
                .into_iter()
                .map(|c| (c.model_type.to_string(), c.clone()))
                .collect(),
        }
    }
}

/// Reject batches larger than `MAX_BATCH_SIZE`
pub fn check_batch_size(len: usize) -> Result<(), GatewayError> {
    if len > MAX_BATCH_SIZE {
        return Err(GatewayError::ValidationError(format!(
            "Batch size cannot exceed {} requests",
            MAX_BATCH_SIZE
        )));
    }
    Ok(())
}

fn unsupported(model: ModelType) -> GatewayError {
    GatewayError::ValidationError(format!("Unsupported model type: {}", model))
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn as_handler_error(e: GatewayError) -> GatewayError {
    match e {
        GatewayError::HandlerError(_) => e,
        other => GatewayError::HandlerError(other.to_string()),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", msg)
    } else {
        "handler panicked".to_string()
    }
}
