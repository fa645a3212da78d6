// Configuration management

use crate::core::errors::GatewayError;
use crate::core::models::{RequestPolicy, MAX_TOKENS_LIMIT};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_API_KEY_SALT: &str = "default-salt-change-in-production";

/// Application configuration loaded from environment variables
///
/// All configuration is validated on load with clear error messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub bind_address: String,
    pub port: u16,
    pub debug: bool,

    // Redis configuration; `None` runs on the in-memory store only
    pub redis_url: Option<String>,
    #[serde(skip_serializing)]
    pub redis_password: Option<String>,
    pub redis_db: u32,
    pub redis_connection_timeout_secs: u64,
    pub redis_operation_timeout_ms: u64,

    // API keys
    #[serde(skip_serializing)]
    pub api_key_salt: String,
    pub api_keys_path: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub mcp_api_key: Option<String>,

    // Rate limiting
    pub default_rate_limit: u32,
    pub rate_limit_window_secs: u64,

    // Request defaults and validation
    pub default_max_tokens: u32,
    pub default_temperature: f64,
    pub max_prompt_chars: usize,
    pub sensitive_context_keys: Vec<String>,
    pub handler_latency_ms: u64,

    // Middleware configuration
    pub request_timeout_secs: u64,
    pub body_size_limit_bytes: usize,
    pub security_headers_enabled: bool,

    // Logging configuration
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

/// Reads raw variables through an injectable lookup
struct EnvReader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl<'a> EnvReader<'a> {
    /// Get environment variable or return default value
    fn get_env_or_default(&self, key: &str, default: &str) -> String {
        (self.lookup)(key).unwrap_or_else(|| default.to_string())
    }

    /// Get optional environment variable (empty counts as unset)
    fn get_optional_env(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    /// Parse a value from an environment variable or return default
    fn parse_or_default<T>(&self, key: &str, default: T) -> Result<T, GatewayError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_optional_env(key) {
            Some(value) => value.trim().parse::<T>().map_err(|e| {
                GatewayError::ConfigurationError(format!("Invalid {} value '{}': {}", key, value, e))
            }),
            None => Ok(default),
        }
    }

    fn parse_bool_or_default(&self, key: &str, default: bool) -> Result<bool, GatewayError> {
        match self.get_optional_env(key) {
            Some(value) => match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(GatewayError::ConfigurationError(format!(
                    "Invalid {} value '{}': expected true or false",
                    key, value
                ))),
            },
            None => Ok(default),
        }
    }

    fn parse_list_or_default(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.get_optional_env(key) {
            Some(value) => value
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Supports `.env` file loading in development (via dotenv crate).
    pub fn from_env() -> Result<Self, GatewayError> {
        // Skip in test environment to avoid interfering with test environment variables
        #[cfg(not(test))]
        {
            dotenv::dotenv().ok(); // Ignore errors (file may not exist)
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup: &lookup };

        let bind_address = env
            .get_optional_env("BIND_ADDRESS")
            .or_else(|| env.get_optional_env("HOST"))
            .unwrap_or_else(|| "0.0.0.0".to_string());

        // Unset means the local default; set-but-empty disables Redis
        let redis_url = match lookup("REDIS_URL") {
            None => Some("redis://localhost:6379".to_string()),
            Some(url) if url.trim().is_empty() => None,
            Some(url) => Some(url.trim().to_string()),
        };

        let log_level = match env.get_env_or_default("LOG_LEVEL", "info").to_lowercase().as_str() {
            "warning" => "warn".to_string(),
            other => other.to_string(),
        };

        let config = Self {
            bind_address,
            port: env.parse_or_default("PORT", 8000)?,
            debug: env.parse_bool_or_default("DEBUG", false)?,
            redis_url,
            redis_password: env.get_optional_env("REDIS_PASSWORD"),
            redis_db: env.parse_or_default("REDIS_DB", 0)?,
            redis_connection_timeout_secs: env.parse_or_default("REDIS_CONNECTION_TIMEOUT_SECS", 5)?,
            redis_operation_timeout_ms: env.parse_or_default("REDIS_OPERATION_TIMEOUT_MS", 250)?,
            api_key_salt: env.get_env_or_default("API_KEY_SALT", DEFAULT_API_KEY_SALT),
            api_keys_path: env.get_optional_env("API_KEYS_PATH").map(PathBuf::from),
            mcp_api_key: env.get_optional_env("MCP_API_KEY"),
            default_rate_limit: env.parse_or_default("DEFAULT_RATE_LIMIT", 60)?,
            rate_limit_window_secs: env.parse_or_default("RATE_LIMIT_WINDOW", 60)?,
            default_max_tokens: env.parse_or_default("DEFAULT_MAX_TOKENS", 2048)?,
            default_temperature: env.parse_or_default("DEFAULT_TEMPERATURE", 0.7)?,
            max_prompt_chars: env.parse_or_default("MAX_PROMPT_CHARS", 10_000)?,
            sensitive_context_keys: env.parse_list_or_default(
                "SENSITIVE_CONTEXT_KEYS",
                &["password", "api_key", "secret", "token"],
            ),
            handler_latency_ms: env.parse_or_default("HANDLER_LATENCY_MS", 0)?,
            request_timeout_secs: env.parse_or_default("REQUEST_TIMEOUT_SECS", 30)?,
            body_size_limit_bytes: env.parse_or_default("BODY_SIZE_LIMIT_BYTES", 2 * 1024 * 1024)?,
            security_headers_enabled: env.parse_bool_or_default("SECURITY_HEADERS_ENABLED", true)?,
            log_level,
            log_format: env.get_env_or_default("LOG_FORMAT", "text").to_lowercase(),
        };

        // Post-load validation
        config.validate()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.port == 0 {
            return Err(GatewayError::ConfigurationError(
                "Invalid PORT value '0': must be between 1 and 65535".to_string(),
            ));
        }

        Self::require_positive("DEFAULT_RATE_LIMIT", self.default_rate_limit as u64)?;
        Self::require_positive("RATE_LIMIT_WINDOW", self.rate_limit_window_secs)?;
        Self::require_positive("MAX_PROMPT_CHARS", self.max_prompt_chars as u64)?;
        Self::require_positive("REQUEST_TIMEOUT_SECS", self.request_timeout_secs)?;
        Self::require_positive("BODY_SIZE_LIMIT_BYTES", self.body_size_limit_bytes as u64)?;
        Self::require_positive("REDIS_CONNECTION_TIMEOUT_SECS", self.redis_connection_timeout_secs)?;
        Self::require_positive("REDIS_OPERATION_TIMEOUT_MS", self.redis_operation_timeout_ms)?;

        if self.default_max_tokens == 0 || self.default_max_tokens > MAX_TOKENS_LIMIT {
            return Err(GatewayError::ConfigurationError(format!(
                "DEFAULT_MAX_TOKENS must be between 1 and {}: {}",
                MAX_TOKENS_LIMIT, self.default_max_tokens
            )));
        }

        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(GatewayError::ConfigurationError(format!(
                "DEFAULT_TEMPERATURE must be between 0.0 and 2.0: {}",
                self.default_temperature
            )));
        }

        if let Some(ref url) = self.redis_url {
            Self::validate_redis_url(url)?;
        }

        Self::validate_log_level(&self.log_level)?;
        Self::validate_log_format(&self.log_format)?;

        Ok(())
    }

    fn require_positive(key: &str, value: u64) -> Result<(), GatewayError> {
        if value == 0 {
            return Err(GatewayError::ConfigurationError(format!(
                "{} must be greater than 0",
                key
            )));
        }
        Ok(())
    }

    /// Validate URL format
    fn validate_redis_url(url: &str) -> Result<(), GatewayError> {
        let parsed = url::Url::parse(url).map_err(|e| {
            GatewayError::ConfigurationError(format!("Invalid REDIS_URL '{}': {}", url, e))
        })?;
        match parsed.scheme() {
            "redis" | "rediss" | "redis+unix" | "unix" => Ok(()),
            scheme => Err(GatewayError::ConfigurationError(format!(
                "Invalid REDIS_URL scheme '{}'",
                scheme
            ))),
        }
    }

    /// Validate log level
    fn validate_log_level(level: &str) -> Result<(), GatewayError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level) {
            return Err(GatewayError::ConfigurationError(format!(
                "Invalid LOG_LEVEL '{}': must be one of {}",
                level,
                valid_levels.join(", ")
            )));
        }
        Ok(())
    }

    /// Validate log format
    fn validate_log_format(format: &str) -> Result<(), GatewayError> {
        if format != "json" && format != "text" {
            return Err(GatewayError::ConfigurationError(format!(
                "Invalid LOG_FORMAT '{}': must be 'json' or 'text'",
                format
            )));
        }
        Ok(())
    }

    /// Redis URL with password and database applied, if Redis is enabled
    pub fn redis_connection_url(&self) -> Result<Option<String>, GatewayError> {
        let Some(ref raw) = self.redis_url else {
            return Ok(None);
        };
        let mut url = url::Url::parse(raw).map_err(|e| {
            GatewayError::ConfigurationError(format!("Invalid REDIS_URL '{}': {}", raw, e))
        })?;

        if let Some(ref password) = self.redis_password {
            url.set_password(Some(password)).map_err(|_| {
                GatewayError::ConfigurationError("REDIS_URL cannot carry a password".to_string())
            })?;
        }
        if self.redis_db != 0 && matches!(url.path(), "" | "/") {
            url.set_path(&format!("/{}", self.redis_db));
        }
        Ok(Some(url.to_string()))
    }

    /// Construction-time limits for request envelopes
    pub fn request_policy(&self) -> RequestPolicy {
        RequestPolicy {
            max_prompt_chars: self.max_prompt_chars,
            default_max_tokens: self.default_max_tokens,
            default_temperature: self.default_temperature,
            sensitive_keys: self.sensitive_context_keys.clone(),
        }
    }

    pub fn redis_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.redis_connection_timeout_secs)
    }

    pub fn redis_operation_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_operation_timeout_ms)
    }

    pub fn handler_latency(&self) -> Duration {
        Duration::from_millis(self.handler_latency_ms)
    }
}

impl Config {
    /// Create a test configuration for unit tests
    ///
    /// This bypasses environment variable loading; Redis is disabled.
    pub fn test_config() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            debug: false,
            redis_url: None,
            redis_password: None,
            redis_db: 0,
            redis_connection_timeout_secs: 1,
            redis_operation_timeout_ms: 100,
            api_key_salt: "test-salt".to_string(),
            api_keys_path: None,
            mcp_api_key: None,
            default_rate_limit: 60,
            rate_limit_window_secs: 60,
            default_max_tokens: 2048,
            default_temperature: 0.7,
            max_prompt_chars: 10_000,
            sensitive_context_keys: ["password", "api_key", "secret", "token"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            handler_latency_ms: 0,
            request_timeout_secs: 30,
            body_size_limit_bytes: 2 * 1024 * 1024,
            security_headers_enabled: true,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}
