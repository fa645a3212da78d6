// Debugging endpoints under /api/v1/debugger

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde_json::{json, Value};
use tracing::info;

use crate::api::codegen::{capabilities_of, LanguageQuery};
use crate::api::handlers::{require_success, tagged};
use crate::api::responses::{ApiError, JsonBody};
use crate::api::AppState;
use crate::auth::auth_middleware::require_permission;
use crate::auth::key_registry::ApiKeyRecord;
use crate::core::capabilities::ModelCapabilities;
use crate::core::models::{McpRequest, McpRequestPayload, McpResponse, ModelType};
use crate::engine::templates;

const FIX_INSTRUCTION: &str = "Fix the following code and explain the issues:";
const PERFORMANCE_INSTRUCTION: &str = "Analyze the performance of this code and suggest optimizations:";
const SECURITY_INSTRUCTION: &str = "Analyze this code for security vulnerabilities and suggest fixes:";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/capabilities", get(capabilities))
        .route("/analyze", post(analyze))
        .route("/fix", post(fix))
        .route("/performance", post(performance))
        .route("/security", post(security))
        .route("/common-issues", get(common_issues))
        .route("/best-practices", get(best_practices))
        .route("/stats", get(stats))
        .route("/health", get(health))
}

/// Which server-side framing a debugger endpoint applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Analysis {
    General,
    Fix,
    Performance,
    Security,
}

impl Analysis {
    fn instruction(self) -> Option<&'static str> {
        match self {
            Analysis::General => None,
            Analysis::Fix => Some(FIX_INSTRUCTION),
            Analysis::Performance => Some(PERFORMANCE_INSTRUCTION),
            Analysis::Security => Some(SECURITY_INSTRUCTION),
        }
    }

    fn annotate(self, response: &mut McpResponse, original_prompt: Option<String>) {
        let metadata = &mut response.metadata;
        match self {
            Analysis::General => {}
            Analysis::Fix => {
                metadata.insert("fix_applied".to_string(), Value::Bool(true));
            }
            Analysis::Performance => {
                metadata.insert("analysis_type".to_string(), json!("performance"));
            }
            Analysis::Security => {
                metadata.insert("analysis_type".to_string(), json!("security"));
                metadata.insert("security_scan".to_string(), Value::Bool(true));
            }
        }
        if let Some(original) = original_prompt {
            metadata.insert("original_prompt".to_string(), Value::String(original));
        }
    }
}

async fn run_analysis(
    state: AppState,
    record: ApiKeyRecord,
    payload: McpRequestPayload,
    analysis: Analysis,
) -> Result<Json<McpResponse>, ApiError> {
    let fallback_id = payload.request_id.clone();
    require_permission(&record, "write").map_err(|e| tagged(e, fallback_id.as_deref()))?;

    let mut request = McpRequest::from_payload(payload, &state.policy)
        .map_err(|e| tagged(e, fallback_id.as_deref()))?;
    request.retarget(ModelType::Debugger);
    let original_prompt = analysis.instruction().map(|instruction| request.reframe_prompt(instruction));

    let id = request.request_id().to_string();
    info!(request_id = %id, analysis = ?analysis, "Processing debugger request");

    let response = state
        .router
        .dispatch(request)
        .await
        .map_err(|e| tagged(e, Some(&id)))?;
    let mut response = require_success(response)?;
    analysis.annotate(&mut response, original_prompt);
    Ok(Json(response))
}

async fn capabilities(State(state): State<AppState>) -> Result<Json<ModelCapabilities>, ApiError> {
    capabilities_of(&state, ModelType::Debugger).map(Json)
}

async fn analyze(
    State(state): State<AppState>,
    Extension(record): Extension<ApiKeyRecord>,
    JsonBody(payload): JsonBody<McpRequestPayload>,
) -> Result<Json<McpResponse>, ApiError> {
    run_analysis(state, record, payload, Analysis::General).await
}

async fn fix(
    State(state): State<AppState>,
    Extension(record): Extension<ApiKeyRecord>,
    JsonBody(payload): JsonBody<McpRequestPayload>,
) -> Result<Json<McpResponse>, ApiError> {
    run_analysis(state, record, payload, Analysis::Fix).await
}

async fn performance(
    State(state): State<AppState>,
    Extension(record): Extension<ApiKeyRecord>,
    JsonBody(payload): JsonBody<McpRequestPayload>,
) -> Result<Json<McpResponse>, ApiError> {
    run_analysis(state, record, payload, Analysis::Performance).await
}

async fn security(
    State(state): State<AppState>,
    Extension(record): Extension<ApiKeyRecord>,
    JsonBody(payload): JsonBody<McpRequestPayload>,
) -> Result<Json<McpResponse>, ApiError> {
    run_analysis(state, record, payload, Analysis::Security).await
}

async fn common_issues() -> Json<Value> {
    let issues: Vec<Value> = templates::common_issues()
        .into_iter()
        .map(|(name, description, solutions)| {
            json!({"name": name, "description": description, "solutions": solutions})
        })
        .collect();
    Json(json!({
        "common_issues": issues,
        "metadata": {"total_categories": issues.len()}
    }))
}

/// GET /best-practices?language=
async fn best_practices(Query(query): Query<LanguageQuery>) -> Result<Json<Value>, ApiError> {
    let language = query.language.to_lowercase();
    let practices = templates::best_practices(&language).ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("Best practices not available for language: {}", language),
        )
    })?;

    Ok(Json(json!({
        "language": language,
        "practices": practices,
        "metadata": {"total_practices": practices.len()}
    })))
}

async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let capabilities = capabilities_of(&state, ModelType::Debugger)?;
    Ok(Json(json!({
        "model_type": ModelType::Debugger,
        "total_requests": state.router.request_count(),
        "supported_languages": capabilities.supported_languages,
        "specializations": capabilities.specializations,
        "max_tokens": capabilities.max_tokens,
        "analysis_types": ["general", "performance", "security", "code_fix"],
    })))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "debugger",
        "model": ModelType::Debugger,
    }))
}
