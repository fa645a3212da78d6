// HTTP tests for sliding-window admission, quota headers and store fallback

use axum::http::{header, StatusCode};
use mcp_gateway::api::create_router;
use mcp_gateway::config::Config;
use mcp_gateway::engine::handlers::HandlerSet;
use mcp_gateway::state::WindowStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use super::common::*;

fn mcp_body() -> serde_json::Value {
    json!({"model": "aiden-7b", "prompt": "hello"})
}

#[tokio::test]
async fn test_quota_exhaustion_returns_429() {
    let app = test_app();

    for expected_remaining in (0..WRITER_QUOTA).rev() {
        let response = app
            .clone()
            .oneshot(post_json("/mcp", Some(WRITER_KEY), &mcp_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_u64(&response, "x-ratelimit-remaining"), expected_remaining as u64);
    }

    let response = app
        .oneshot(post_json("/mcp", Some(WRITER_KEY), &mcp_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_u64(&response, "x-ratelimit-limit"), WRITER_QUOTA as u64);
    assert_eq!(header_u64(&response, "x-ratelimit-remaining"), 0);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["error"], "rate_limit_exceeded");
    assert_eq!(body["retry_after"], 60);
}

#[tokio::test]
async fn test_exempt_paths_ignore_exhausted_quota() {
    let mut config = Config::test_config();
    config.default_rate_limit = 1;
    let app = create_router(test_state_with(config, None, HandlerSet::builtin(Duration::ZERO)));

    let first = app.clone().oneshot(get("/", None)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = app.clone().oneshot(get("/", None)).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    for path in ["/health", "/openapi.json", "/health"] {
        let response = app.clone().oneshot(get(path, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", path);
        assert!(!response.headers().contains_key("x-ratelimit-limit"));
    }
}

#[tokio::test]
async fn test_invalid_key_limited_with_default_quota() {
    let response = test_app()
        .oneshot(post_json("/mcp", Some("unknown-key"), &mcp_body()))
        .await
        .unwrap();

    // Admission happens before authentication
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(header_u64(&response, "x-ratelimit-limit"), 60);
    assert_eq!(header_u64(&response, "x-ratelimit-remaining"), 59);
}

#[tokio::test]
async fn test_keyless_clients_partitioned_by_forwarded_address() {
    let mut config = Config::test_config();
    config.default_rate_limit = 1;
    let app = create_router(test_state_with(config, None, HandlerSet::builtin(Duration::ZERO)));

    let from = |ip: &str| {
        let mut request = get("/", None);
        request.headers_mut().insert("x-forwarded-for", ip.parse().unwrap());
        request
    };

    assert_eq!(app.clone().oneshot(from("10.0.0.1")).await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        app.clone().oneshot(from("10.0.0.1, 172.16.0.1")).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(app.oneshot(from("10.0.0.2")).await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rotating_invalid_keys_share_address_window() {
    let mut config = Config::test_config();
    config.default_rate_limit = 1;
    let app = create_router(test_state_with(config, None, HandlerSet::builtin(Duration::ZERO)));

    let with_key = |key: &str| {
        let mut request = post_json("/mcp", Some(key), &mcp_body());
        request.headers_mut().insert("x-forwarded-for", "10.0.0.7".parse().unwrap());
        request
    };

    let first = app.clone().oneshot(with_key("bogus-1")).await.unwrap();
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(header_u64(&first, "x-ratelimit-limit"), 1);

    for key in ["bogus-2", "bogus-3"] {
        let response = app.clone().oneshot(with_key(key)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS, "{}", key);
    }

    // A registered key still gets its own window from the same address
    let valid = app.oneshot(with_key(WRITER_KEY)).await.unwrap();
    assert_eq!(valid.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_keys_do_not_share_windows() {
    let app = test_app();
    for _ in 0..WRITER_QUOTA {
        app.clone()
            .oneshot(post_json("/mcp", Some(WRITER_KEY), &mcp_body()))
            .await
            .unwrap();
    }
    let writer = app
        .clone()
        .oneshot(post_json("/mcp", Some(WRITER_KEY), &mcp_body()))
        .await
        .unwrap();
    assert_eq!(writer.status(), StatusCode::TOO_MANY_REQUESTS);

    let reader = app.oneshot(get("/api/v1/codegen/health", Some(READER_KEY))).await.unwrap();
    assert_eq!(reader.status(), StatusCode::OK);
    assert_eq!(header_u64(&reader, "x-ratelimit-remaining"), 99);
}

#[tokio::test]
async fn test_failing_store_falls_back_to_memory() {
    let store = Arc::new(FailingWindowStore::default());
    let state = test_state_with(
        Config::test_config(),
        Some(store.clone() as Arc<dyn WindowStore>),
        HandlerSet::builtin(Duration::ZERO),
    );
    let metrics = state.metrics.clone();
    let app = create_router(state);

    for _ in 0..WRITER_QUOTA {
        let response = app
            .clone()
            .oneshot(post_json("/mcp", Some(WRITER_KEY), &mcp_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // The in-memory store still enforces the quota
    let response = app
        .clone()
        .oneshot(post_json("/mcp", Some(WRITER_KEY), &mcp_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    assert!(store.call_count() >= 1);
    assert_eq!(metrics.fallback_count(), WRITER_QUOTA as u64 + 1);

    let health = body_json(app.oneshot(get("/health", None)).await.unwrap()).await;
    assert_eq!(health["redis"], "disconnected");
}

#[tokio::test]
async fn test_store_outage_mid_run_is_invisible_to_clients() {
    let store = Arc::new(SwitchableWindowStore::default());
    let state = test_state_with(
        Config::test_config(),
        Some(store.clone() as Arc<dyn WindowStore>),
        HandlerSet::builtin(Duration::ZERO),
    );
    let limiter = state.limiter.clone();
    let app = create_router(state);

    let healthy = app
        .clone()
        .oneshot(post_json("/mcp", Some(WRITER_KEY), &mcp_body()))
        .await
        .unwrap();
    assert_eq!(healthy.status(), StatusCode::OK);
    assert_eq!(header_u64(&healthy, "x-ratelimit-remaining"), WRITER_QUOTA as u64 - 1);

    store.set_down(true);
    for _ in 0..WRITER_QUOTA {
        let response = app
            .clone()
            .oneshot(post_json("/mcp", Some(WRITER_KEY), &mcp_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let denied = app
        .clone()
        .oneshot(post_json("/mcp", Some(WRITER_KEY), &mcp_body()))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limiter.is_degraded());

    let health = body_json(app.oneshot(get("/health", None)).await.unwrap()).await;
    assert_eq!(health["redis"], "disconnected");
}
