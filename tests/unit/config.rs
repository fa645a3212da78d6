// Environment-backed configuration

use mcp_gateway::config::Config;
use std::collections::HashMap;

fn load(vars: &[(&str, &str)]) -> Result<Config, mcp_gateway::core::errors::GatewayError> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(move |key| map.get(key).cloned())
}

#[test]
fn test_window_and_quota_overrides() {
    let config = load(&[("DEFAULT_RATE_LIMIT", "10"), ("RATE_LIMIT_WINDOW", "30")]).unwrap();
    assert_eq!(config.default_rate_limit, 10);
    assert_eq!(config.rate_limit_window_secs, 30);
}

#[test]
fn test_unparseable_numbers_name_the_variable() {
    let err = load(&[("RATE_LIMIT_WINDOW", "soon")]).unwrap_err();
    assert!(err.to_string().contains("RATE_LIMIT_WINDOW"));
}

#[test]
fn test_secrets_not_serialized() {
    let config = load(&[
        ("API_KEY_SALT", "pepper"),
        ("MCP_API_KEY", "env-key"),
        ("REDIS_PASSWORD", "hunter2"),
    ])
    .unwrap();
    let json = serde_json::to_string(&config).unwrap();
    assert!(!json.contains("pepper"));
    assert!(!json.contains("env-key"));
    assert!(!json.contains("hunter2"));
}

#[test]
fn test_timeouts_and_latency_as_durations() {
    let config = load(&[("REDIS_OPERATION_TIMEOUT_MS", "75"), ("HANDLER_LATENCY_MS", "20")]).unwrap();
    assert_eq!(config.redis_operation_timeout().as_millis(), 75);
    assert_eq!(config.handler_latency().as_millis(), 20);
    assert_eq!(config.redis_connection_timeout().as_secs(), 5);
}

#[test]
fn test_json_log_format_accepted() {
    assert_eq!(load(&[("LOG_FORMAT", "JSON")]).unwrap().log_format, "json");
}
