// Domain error types - every failure the gateway can report, with HTTP mapping

use thiserror::Error;

/// Main error type for the gateway
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// No `X-API-Key` header (HTTP 401)
    #[error("API key required")]
    MissingApiKey,

    /// Unknown or revoked API key (HTTP 401)
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Key lacks the permission a route or handler requires (HTTP 403)
    #[error("Insufficient permissions. Required: {0}")]
    PermissionDenied(String),

    /// Malformed request or unknown model target (HTTP 400)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Sliding window quota exhausted (HTTP 429)
    #[error("Rate limit of {limit} requests per {window_secs}s exceeded")]
    RateLimitExceeded {
        limit: u32,
        window_secs: u64,
        retry_after_secs: u64,
    },

    /// Handler failure. Carried inside a `success=false` envelope, not an HTTP error.
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// Distributed store failure. Recovered by the limiter via the in-memory backend.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Configuration error (HTTP 500)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Anything unclassified (HTTP 500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::MissingApiKey | GatewayError::InvalidApiKey => 401,
            GatewayError::PermissionDenied(_) => 403,
            GatewayError::ValidationError(_) => 400,
            GatewayError::RateLimitExceeded { .. } => 429,
            GatewayError::BackendUnavailable(_) => 503,
            GatewayError::HandlerError(_)
            | GatewayError::ConfigurationError(_)
            | GatewayError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable label used in the `error` field of JSON bodies
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::MissingApiKey => "missing_api_key",
            GatewayError::InvalidApiKey => "invalid_api_key",
            GatewayError::PermissionDenied(_) => "permission_denied",
            GatewayError::ValidationError(_) => "validation_error",
            GatewayError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            GatewayError::HandlerError(_) => "handler_error",
            GatewayError::BackendUnavailable(_) => "service_unavailable",
            GatewayError::ConfigurationError(_) | GatewayError::Internal(_) => "internal_error",
        }
    }

    /// Get user-friendly error message (no sensitive information)
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::MissingApiKey => {
                "API key required. Please provide a valid API key in the X-API-Key header.".to_string()
            }
            GatewayError::InvalidApiKey => {
                "Invalid API key. Please check your API key and try again.".to_string()
            }
            GatewayError::PermissionDenied(permission) => {
                format!("Insufficient permissions. Required: {}", permission)
            }
            GatewayError::ValidationError(reason) => reason.clone(),
            GatewayError::RateLimitExceeded { .. } => self.to_string(),
            GatewayError::HandlerError(_) => "Error processing request".to_string(),
            GatewayError::BackendUnavailable(_) => "Service unavailable".to_string(),
            GatewayError::ConfigurationError(_) | GatewayError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// Short type name recorded in failure envelope metadata
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::MissingApiKey | GatewayError::InvalidApiKey => "AuthError",
            GatewayError::PermissionDenied(_) => "PermissionError",
            GatewayError::ValidationError(_) => "ValidationError",
            GatewayError::RateLimitExceeded { .. } => "RateLimitExceeded",
            GatewayError::HandlerError(_) => "HandlerError",
            GatewayError::BackendUnavailable(_) => "BackendUnavailable",
            GatewayError::ConfigurationError(_) => "ConfigurationError",
            GatewayError::Internal(_) => "InternalError",
        }
    }
}
