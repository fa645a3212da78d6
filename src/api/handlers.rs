// Request handlers for the gateway's top-level endpoints

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::middleware::RequestId;
use crate::api::responses::{ApiError, BatchResponse, HealthResponse, JsonBody};
use crate::api::AppState;
use crate::auth::key_registry::ApiKeyRecord;
use crate::core::errors::GatewayError;
use crate::core::models::{McpRequest, McpRequestPayload, McpResponse, ModelType};
use crate::engine::router::check_batch_size;

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "MCP Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "documentation": "/openapi.json"
    }))
}

/// GET /health
///
/// `redis` is `disabled` when no Redis store is configured.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let redis = match state.limiter.primary_healthy().await {
        None => "disabled",
        Some(true) => "connected",
        Some(false) => "disconnected",
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        redis: redis.to_string(),
        timestamp: Utc::now(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        requests_processed: state.router.request_count(),
    })
}

/// GET /metrics in Prometheus text format
pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// GET /openapi.json
pub async fn openapi() -> Json<Value> {
    let envelope = json!({"$ref": "#/components/schemas/McpResponse"});
    Json(json!({
        "openapi": "3.0.3",
        "info": {"title": "MCP Gateway", "version": env!("CARGO_PKG_VERSION")},
        "components": {
            "securitySchemes": {
                "ApiKey": {"type": "apiKey", "in": "header", "name": "X-API-Key"}
            }
        },
        "paths": {
            "/health": {"get": {"summary": "Liveness and backend status"}},
            "/metrics": {"get": {"summary": "Prometheus metrics"}},
            "/mcp": {"post": {"summary": "Dispatch one request", "responses": {"200": envelope}}},
            "/mcp/batch": {"post": {"summary": "Dispatch up to 10 requests"}},
            "/api/v1/codegen/generate": {"post": {"summary": "Code generation"}},
            "/api/v1/codegen/generate/batch": {"post": {"summary": "Batch code generation"}},
            "/api/v1/debugger/analyze": {"post": {"summary": "Code analysis"}},
            "/api/v1/debugger/fix": {"post": {"summary": "Code fix"}},
            "/api/v1/debugger/performance": {"post": {"summary": "Performance analysis"}},
            "/api/v1/debugger/security": {"post": {"summary": "Security analysis"}}
        }
    }))
}

/// POST /mcp
///
/// Handler failures come back as 200 with `success=false`; only request
/// validation, permission and unknown-model errors are HTTP errors.
pub async fn mcp_handler(
    State(state): State<AppState>,
    Extension(record): Extension<ApiKeyRecord>,
    request_id: Option<Extension<RequestId>>,
    JsonBody(payload): JsonBody<McpRequestPayload>,
) -> Result<Json<McpResponse>, ApiError> {
    let fallback_id = payload
        .request_id
        .clone()
        .or_else(|| request_id.map(|Extension(RequestId(id))| id));

    let request = McpRequest::from_payload(payload, &state.policy)
        .map_err(|e| tagged(e, fallback_id.as_deref()))?;
    let id = request.request_id().to_string();

    info!(request_id = %id, model = %request.model(), key = %record.display_name, "Processing MCP request");

    state
        .router
        .authorize(request.model(), &record)
        .map_err(|e| tagged(e, Some(&id)))?;
    let response = state
        .router
        .dispatch(request)
        .await
        .map_err(|e| tagged(e, Some(&id)))?;

    Ok(Json(response))
}

/// POST /mcp/batch
pub async fn batch_handler(
    State(state): State<AppState>,
    Extension(record): Extension<ApiKeyRecord>,
    JsonBody(payloads): JsonBody<Vec<McpRequestPayload>>,
) -> Result<Json<BatchResponse>, ApiError> {
    info!(batch_size = payloads.len(), "Processing MCP batch");

    let results = dispatch_payloads(&state, &record, payloads, None).await?;
    Ok(Json(BatchResponse {
        batch_size: results.len(),
        results,
    }))
}

/// Validate, authorize and dispatch a batch, keeping input order
///
/// Items that fail validation or authorization get their own failure
/// envelope; the rest go through the router's batch dispatch. `force`
/// retargets every item to one model.
pub(crate) async fn dispatch_payloads(
    state: &AppState,
    record: &ApiKeyRecord,
    payloads: Vec<McpRequestPayload>,
    force: Option<ModelType>,
) -> Result<Vec<McpResponse>, GatewayError> {
    check_batch_size(payloads.len())?;

    let mut slots: Vec<Option<McpResponse>> = Vec::with_capacity(payloads.len());
    let mut positions = Vec::new();
    let mut valid = Vec::new();

    for (index, payload) in payloads.into_iter().enumerate() {
        let model = force.unwrap_or(payload.model);
        let fallback_id = payload
            .request_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let checked = McpRequest::from_payload(payload, &state.policy).and_then(|mut request| {
            if let Some(model) = force {
                request.retarget(model);
            }
            state.router.authorize(request.model(), record)?;
            Ok(request)
        });

        match checked {
            Ok(request) => {
                positions.push(index);
                valid.push(request);
                slots.push(None);
            }
            Err(e) => {
                warn!(request_id = %fallback_id, error = %e, "Batch item rejected");
                slots.push(Some(McpResponse::failure(&fallback_id, model, &e, 0.0)));
            }
        }
    }

    let dispatched = state.router.dispatch_batch(valid).await?;
    for (index, response) in positions.into_iter().zip(dispatched) {
        slots[index] = Some(response);
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Turn a `success=false` envelope into a 500 for the model-specific endpoints
pub(crate) fn require_success(response: McpResponse) -> Result<McpResponse, ApiError> {
    if response.success {
        return Ok(response);
    }
    Err(ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "handler_error",
        response.response,
    )
    .with_request_id(response.request_id))
}

pub(crate) fn tagged(err: GatewayError, request_id: Option<&str>) -> ApiError {
    let api_error = ApiError::from(err);
    match request_id {
        Some(id) => api_error.with_request_id(id),
        None => api_error,
    }
}
