// Domain models - request/response envelopes, validated at construction

use crate::core::errors::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque key-value bag attached to a request
pub type ContextMap = Map<String, Value>;

/// Hard ceiling on `max_tokens` accepted from any client
pub const MAX_TOKENS_LIMIT: u32 = 8192;

/// Supported model types for routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    #[serde(rename = "aiden-7b")]
    Aiden7b,
    #[serde(rename = "codegen")]
    Codegen,
    #[serde(rename = "debugger")]
    Debugger,
}

impl ModelType {
    pub const ALL: [ModelType; 3] = [ModelType::Aiden7b, ModelType::Codegen, ModelType::Debugger];

    /// Wire name of the model
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Aiden7b => "aiden-7b",
            ModelType::Codegen => "codegen",
            ModelType::Debugger => "debugger",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelType::ALL
            .into_iter()
            .find(|model| model.as_str() == s)
            .ok_or_else(|| GatewayError::ValidationError(format!("Unsupported model type: {}", s)))
    }
}

/// Limits and defaults applied when a request envelope is constructed
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPolicy {
    pub max_prompt_chars: usize,
    pub default_max_tokens: u32,
    pub default_temperature: f64,
    /// Case-insensitive substrings that may not appear in any context key
    pub sensitive_keys: Vec<String>,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            max_prompt_chars: 10_000,
            default_max_tokens: 2048,
            default_temperature: 0.7,
            sensitive_keys: ["password", "api_key", "secret", "token"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl RequestPolicy {
    /// Reject the first context key containing a sensitive term
    pub fn check_context(&self, context: &ContextMap) -> Result<(), GatewayError> {
        for key in context.keys() {
            let lowered = key.to_lowercase();
            if self.sensitive_keys.iter().any(|term| lowered.contains(term.as_str())) {
                return Err(GatewayError::ValidationError(format!(
                    "Context cannot contain sensitive key: {}",
                    key
                )));
            }
        }
        Ok(())
    }
}

/// Unvalidated request body as it arrives on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequestPayload {
    pub model: ModelType,
    pub prompt: String,
    #[serde(default)]
    pub context: ContextMap,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// MCP (Model Control Protocol) request envelope
///
/// Only obtainable through [`McpRequest::from_payload`] (or serde, which
/// applies the default [`RequestPolicy`]), so every instance is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "McpRequestPayload")]
pub struct McpRequest {
    model: ModelType,
    prompt: String,
    context: ContextMap,
    request_id: String,
    max_tokens: u32,
    temperature: f64,
}

impl McpRequest {
    /// Build a request with default context, id and sampling parameters
    pub fn new(model: ModelType, prompt: impl Into<String>) -> Result<Self, GatewayError> {
        Self::from_payload(
            McpRequestPayload {
                model,
                prompt: prompt.into(),
                context: ContextMap::new(),
                request_id: None,
                max_tokens: None,
                temperature: None,
            },
            &RequestPolicy::default(),
        )
    }

    /// Validate a wire payload against `policy`
    pub fn from_payload(payload: McpRequestPayload, policy: &RequestPolicy) -> Result<Self, GatewayError> {
        if payload.prompt.chars().count() > policy.max_prompt_chars {
            return Err(GatewayError::ValidationError(format!(
                "Prompt exceeds maximum length of {} characters",
                policy.max_prompt_chars
            )));
        }

        let prompt = payload.prompt.trim();
        if prompt.is_empty() {
            return Err(GatewayError::ValidationError(
                "Prompt cannot be empty or only whitespace".to_string(),
            ));
        }

        policy.check_context(&payload.context)?;

        let max_tokens = match payload.max_tokens {
            None => policy.default_max_tokens,
            Some(value) if (1..=MAX_TOKENS_LIMIT as i64).contains(&value) => value as u32,
            Some(value) => {
                return Err(GatewayError::ValidationError(format!(
                    "max_tokens must be between 1 and {}, got {}",
                    MAX_TOKENS_LIMIT, value
                )))
            }
        };

        let temperature = payload.temperature.unwrap_or(policy.default_temperature);
        if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
            return Err(GatewayError::ValidationError(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                temperature
            )));
        }

        let request_id = payload
            .request_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Self {
            model: payload.model,
            prompt: prompt.to_string(),
            context: payload.context,
            request_id,
            max_tokens,
            temperature,
        })
    }

    /// Attach a context bag, re-checking it against the default policy
    pub fn with_context(mut self, context: ContextMap) -> Result<Self, GatewayError> {
        RequestPolicy::default().check_context(&context)?;
        self.context = context;
        Ok(self)
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Result<Self, GatewayError> {
        if max_tokens == 0 || max_tokens > MAX_TOKENS_LIMIT {
            return Err(GatewayError::ValidationError(format!(
                "max_tokens must be between 1 and {}, got {}",
                MAX_TOKENS_LIMIT, max_tokens
            )));
        }
        self.max_tokens = max_tokens;
        Ok(self)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn model(&self) -> ModelType {
        self.model
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn context(&self) -> &ContextMap {
        &self.context
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Context string value, if present
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }

    /// Point the request at a different model
    pub fn retarget(&mut self, model: ModelType) {
        self.model = model;
    }

    /// Prefix the prompt with a server-side instruction; returns the original prompt
    pub fn reframe_prompt(&mut self, instruction: &str) -> String {
        let original = std::mem::take(&mut self.prompt);
        self.prompt = format!("{}\n\n{}", instruction, original);
        original
    }

    pub(crate) fn clamp_max_tokens(&mut self, ceiling: u32) -> bool {
        if self.max_tokens > ceiling {
            self.max_tokens = ceiling;
            true
        } else {
            false
        }
    }
}

impl TryFrom<McpRequestPayload> for McpRequest {
    type Error = GatewayError;

    fn try_from(payload: McpRequestPayload) -> Result<Self, Self::Error> {
        McpRequest::from_payload(payload, &RequestPolicy::default())
    }
}

/// MCP (Model Control Protocol) response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpResponse {
    pub request_id: String,
    pub model: ModelType,
    pub response: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Processing time in seconds
    pub processing_time: f64,
    pub success: bool,
}

impl McpResponse {
    /// Envelope for a request that failed; `response` carries the error text
    pub fn failure(request_id: &str, model: ModelType, error: &GatewayError, processing_time: f64) -> Self {
        let detail = match error {
            GatewayError::HandlerError(msg) | GatewayError::ValidationError(msg) => msg.clone(),
            other => other.user_message(),
        };

        let mut metadata = Map::new();
        metadata.insert("error".to_string(), Value::String(detail.clone()));
        metadata.insert("error_type".to_string(), Value::String(error.kind().to_string()));

        Self {
            request_id: request_id.to_string(),
            model,
            response: format!("Error processing request: {}", detail),
            metadata,
            processing_time: processing_time.max(0.0),
            success: false,
        }
    }
}
