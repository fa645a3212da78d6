// API key hashing, redaction and generation

use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Number of leading key characters shown in logs and listings
const PREVIEW_CHARS: usize = 10;

/// API key hash - 64-character hex digest of an API key
///
/// The registry keys its table by this value, so raw keys are never held at rest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApiKeyHash(String);

impl ApiKeyHash {
    /// Unsalted SHA-256 of the key
    ///
    /// Deterministic across deployments; used for rate-limit partition keys only.
    pub fn from_api_key(api_key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(api_key.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// HMAC-SHA256 of the key under the deployment salt
    pub fn salted(api_key: &str, salt: &str) -> Self {
        let mut mac = HmacSha256::new_from_slice(salt.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(api_key.as_bytes());
        Self(hex::encode(mac.finalize().into_bytes()))
    }

    /// Create an ApiKeyHash from an existing hash string (64 hex characters)
    ///
    /// Use this for key files that store digests instead of plaintext keys.
    pub fn from_hash_string(hash_str: &str) -> Result<Self, String> {
        if hash_str.len() != 64 {
            return Err(format!("Invalid hash length: expected 64, got {}", hash_str.len()));
        }
        if !hash_str.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("Invalid hash format: must be 64 hex characters".to_string());
        }
        Ok(Self(hash_str.to_ascii_lowercase()))
    }

    /// Get the hash as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApiKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// API key wrapper with memory protection
///
/// Uses `secrecy::Secret` to prevent accidental logging of key material.
pub struct ApiKey(Secret<String>);

impl ApiKey {
    /// Create a new ApiKey from a string
    pub fn new(api_key: &str) -> Self {
        Self(Secret::new(api_key.to_string()))
    }

    /// First characters of the key followed by an ellipsis
    pub fn preview(&self) -> String {
        preview(self.expose_secret())
    }

    /// Expose the secret API key (use with caution)
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("key", &"<REDACTED>")
            .finish()
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<REDACTED>")
    }
}

/// Obfuscated preview of a raw key, safe for logs
pub fn preview(api_key: &str) -> String {
    let head: String = api_key.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", head)
}

/// Generate a new random API key of the form `<prefix>-<32 alphanumerics>`
pub fn generate_api_key(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("{}-{}", prefix, suffix)
}
