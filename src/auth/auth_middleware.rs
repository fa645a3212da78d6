// Axum authentication middleware

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::api::responses::ApiError;
use crate::auth::api_key::ApiKey;
use crate::auth::audit_logger::{AuditLogger, AuthEvent};
use crate::auth::key_registry::{ApiKeyRecord, KeyRegistry};
use crate::core::errors::GatewayError;

/// Header carrying the client API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Authentication state containing all dependencies
#[derive(Clone)]
pub struct AuthState {
    pub registry: Arc<KeyRegistry>,
    pub audit_logger: Arc<AuditLogger>,
}

impl AuthState {
    pub fn new(registry: Arc<KeyRegistry>) -> Self {
        Self {
            registry,
            audit_logger: Arc::new(AuditLogger::new()),
        }
    }
}

/// Authentication middleware function
///
/// Extracts the API key from `X-API-Key`, validates it against the registry,
/// and stores the matching `ApiKeyRecord` in request extensions for handlers.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = extract_ip_address(request.headers());
    let user_agent = extract_user_agent(request.headers());

    let api_key = match extract_api_key(request.headers()) {
        Some(key) => ApiKey::new(&key),
        None => {
            auth_state.audit_logger.log_auth_event(
                &AuthEvent::AuthFailure { reason: "Missing API key".to_string() },
                None,
                ip.as_deref(),
                user_agent.as_deref(),
            );
            return Err(GatewayError::MissingApiKey.into());
        }
    };

    let preview = api_key.preview();
    let record = match auth_state.registry.lookup(api_key.expose_secret()) {
        Some(record) => record,
        None => {
            auth_state.audit_logger.log_auth_event(
                &AuthEvent::AuthFailure { reason: "Invalid API key".to_string() },
                Some(&preview),
                ip.as_deref(),
                user_agent.as_deref(),
            );
            return Err(GatewayError::InvalidApiKey.into());
        }
    };

    auth_state.audit_logger.log_auth_event(
        &AuthEvent::AuthSuccess,
        Some(&preview),
        ip.as_deref(),
        user_agent.as_deref(),
    );

    request.extensions_mut().insert(record);
    Ok(next.run(request).await)
}

/// Check that an authenticated key carries `permission`
pub fn require_permission(record: &ApiKeyRecord, permission: &str) -> Result<(), GatewayError> {
    if record.has_permission(permission) {
        Ok(())
    } else {
        AuditLogger::new().log_auth_event(
            &AuthEvent::PermissionDenied { permission: permission.to_string() },
            Some(&record.key_preview),
            None,
            None,
        );
        Err(GatewayError::PermissionDenied(permission.to_string()))
    }
}

/// Extract API key from request headers
///
/// An empty header value counts as missing.
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Extract IP address from request headers
///
/// Checks `X-Forwarded-For` first (for proxied requests), then `X-Real-IP`.
fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .or_else(|| headers.get("X-Real-IP"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Extract user agent from request headers
fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
