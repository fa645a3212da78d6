// HTTP rate limiting: client identity, admission, and quota headers

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::warn;

use crate::api::responses::ApiError;
use crate::api::AppState;
use crate::auth::auth_middleware::extract_api_key;
use crate::core::errors::GatewayError;
use crate::state::rate_limiter::client_identifier;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Paths never subject to rate limiting
pub const EXEMPT_PATHS: [&str; 4] = ["/health", "/docs", "/redoc", "/openapi.json"];

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path)
}

/// Sliding window admission for every non-exempt request
///
/// Runs before authentication, so callers without a registered key are
/// limited by address under the default quota.
pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let api_key = extract_api_key(request.headers());
    let forwarded_for = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    // Unregistered keys are partitioned by address so rotating bogus keys
    // cannot mint fresh windows
    let known_key = api_key.as_deref().filter(|key| state.registry.validate(key));
    let client_id = client_identifier(known_key, forwarded_for.as_deref(), peer);
    let quota = match known_key {
        Some(key) => state.registry.quota_for(key),
        None => state.registry.default_quota(),
    };

    let admission = state.limiter.admit(&client_id, quota).await;
    if !admission.admitted {
        warn!(client_id = %client_id, limit = quota, backend = admission.backend, "Rate limit exceeded");
        let window = state.limiter.window_secs();
        let mut response = ApiError::from(GatewayError::RateLimitExceeded {
            limit: quota,
            window_secs: window,
            retry_after_secs: window,
        })
        .into_response();
        set_quota_headers(response.headers_mut(), quota, 0, None);
        return response;
    }

    let mut response = next.run(request).await;
    let remaining = state.limiter.remaining(&client_id, quota).await;
    set_quota_headers(response.headers_mut(), quota, remaining, Some(admission.reset_at));
    response
}

fn set_quota_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_at: Option<u64>) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
    if let Some(reset_at) = reset_at {
        headers.insert(RESET_HEADER, HeaderValue::from(reset_at));
    }
}
