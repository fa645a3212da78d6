// Code generation endpoints under /api/v1/codegen

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::handlers::{dispatch_payloads, require_success, tagged};
use crate::api::responses::{ApiError, JsonBody};
use crate::api::AppState;
use crate::auth::auth_middleware::require_permission;
use crate::auth::key_registry::ApiKeyRecord;
use crate::core::capabilities::ModelCapabilities;
use crate::core::models::{McpRequest, McpRequestPayload, McpResponse, ModelType};
use crate::engine::templates;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/capabilities", get(capabilities))
        .route("/generate", post(generate))
        .route("/generate/batch", post(generate_batch))
        .route("/templates", get(code_templates))
        .route("/stats", get(stats))
        .route("/health", get(health))
}

pub(crate) fn capabilities_of(state: &AppState, model: ModelType) -> Result<ModelCapabilities, ApiError> {
    state.router.capabilities().get(model).cloned().ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("{} model capabilities not found", model),
        )
    })
}

async fn capabilities(State(state): State<AppState>) -> Result<Json<ModelCapabilities>, ApiError> {
    capabilities_of(&state, ModelType::Codegen).map(Json)
}

/// POST /generate, always served by the codegen model
async fn generate(
    State(state): State<AppState>,
    Extension(record): Extension<ApiKeyRecord>,
    JsonBody(payload): JsonBody<McpRequestPayload>,
) -> Result<Json<McpResponse>, ApiError> {
    let fallback_id = payload.request_id.clone();
    require_permission(&record, "write").map_err(|e| tagged(e, fallback_id.as_deref()))?;

    let mut request = McpRequest::from_payload(payload, &state.policy)
        .map_err(|e| tagged(e, fallback_id.as_deref()))?;
    request.retarget(ModelType::Codegen);
    let id = request.request_id().to_string();
    info!(request_id = %id, "Processing codegen request");

    let response = state
        .router
        .dispatch(request)
        .await
        .map_err(|e| tagged(e, Some(&id)))?;
    require_success(response).map(Json)
}

async fn generate_batch(
    State(state): State<AppState>,
    Extension(record): Extension<ApiKeyRecord>,
    JsonBody(payloads): JsonBody<Vec<McpRequestPayload>>,
) -> Result<Json<Vec<McpResponse>>, ApiError> {
    require_permission(&record, "write")?;
    info!(batch_size = payloads.len(), "Processing batch codegen request");

    let responses = dispatch_payloads(&state, &record, payloads, Some(ModelType::Codegen)).await?;
    info!(responses = responses.len(), "Batch codegen completed");
    Ok(Json(responses))
}

/// `?language=` query shared by the catalog endpoints, defaulting to python
#[derive(Debug, Deserialize)]
pub(crate) struct LanguageQuery {
    #[serde(default = "default_language")]
    pub(crate) language: String,
}

fn default_language() -> String {
    "python".to_string()
}

/// GET /templates?language=
async fn code_templates(Query(query): Query<LanguageQuery>) -> Result<Json<Value>, ApiError> {
    let language = query.language.to_lowercase();
    let matching: Vec<Value> = templates::code_templates()
        .into_iter()
        .filter(|(_, _, languages)| languages.contains(&language.as_str()))
        .map(|(category, description, languages)| {
            json!({"category": category, "description": description, "languages": languages})
        })
        .collect();

    if matching.is_empty() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("Templates not available for language: {}", language),
        ));
    }

    Ok(Json(json!({
        "language": language,
        "templates": matching,
        "metadata": {"total_templates": matching.len()}
    })))
}

async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let capabilities = capabilities_of(&state, ModelType::Codegen)?;
    Ok(Json(json!({
        "model_type": ModelType::Codegen,
        "total_requests": state.router.request_count(),
        "supported_languages": capabilities.supported_languages,
        "specializations": capabilities.specializations,
        "max_tokens": capabilities.max_tokens,
    })))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "codegen",
        "model": ModelType::Codegen,
    }))
}
