// Startup wiring: keys from a YAML file and the environment

use axum::http::StatusCode;
use mcp_gateway::api::{create_router, AppState};
use mcp_gateway::auth::api_key::ApiKeyHash;
use mcp_gateway::config::Config;
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use tower::ServiceExt;

use super::common::*;

fn key_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_keys_loaded_from_file_and_env() {
    let hashed = ApiKeyHash::salted("hashed-secret", "file-salt");
    let file = key_file(&format!(
        "- key: plain-secret\n  name: Plain\n  rate_limit: 3\n  permissions: [read, write]\n\
         - key_hash: {}\n  name: Hashed\n  rate_limit: 7\n",
        hashed
    ));

    let path = file.path().to_string_lossy().to_string();
    let vars: HashMap<&str, String> = [
        ("REDIS_URL", String::new()),
        ("API_KEY_SALT", "file-salt".to_string()),
        ("API_KEYS_PATH", path),
        ("MCP_API_KEY", "env-secret".to_string()),
    ]
    .into_iter()
    .collect();
    let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();

    let state = AppState::from_config(config, None).unwrap();
    assert_eq!(state.registry.len(), 3);
    let app = create_router(state);

    let body = json!({"model": "codegen", "prompt": "hello"});
    let plain = app
        .clone()
        .oneshot(post_json("/mcp", Some("plain-secret"), &body))
        .await
        .unwrap();
    assert_eq!(plain.status(), StatusCode::OK);
    assert_eq!(header_u64(&plain, "x-ratelimit-limit"), 3);

    let hashed = app
        .clone()
        .oneshot(post_json("/mcp", Some("hashed-secret"), &body))
        .await
        .unwrap();
    assert_eq!(hashed.status(), StatusCode::OK);
    assert_eq!(header_u64(&hashed, "x-ratelimit-limit"), 7);

    let env = app.oneshot(post_json("/mcp", Some("env-secret"), &body)).await.unwrap();
    assert_eq!(env.status(), StatusCode::OK);
    assert_eq!(header_u64(&env, "x-ratelimit-limit"), 500);
}

#[test]
fn test_broken_key_file_fails_startup() {
    let file = key_file("- name: NoKey\n  rate_limit: 1\n");
    let mut config = Config::test_config();
    config.api_keys_path = Some(file.path().to_path_buf());
    assert!(AppState::from_config(config, None).is_err());
}

#[test]
fn test_debug_mode_seeds_development_keys() {
    let mut config = Config::test_config();
    config.debug = true;
    let state = AppState::from_config(config, None).unwrap();
    assert!(state.registry.validate("mcp-key-dev-123"));
    assert_eq!(state.registry.quota_for("mcp-key-prod-456"), 1000);
}
