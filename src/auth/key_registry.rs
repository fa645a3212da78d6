// In-process API key registry with per-key quotas and permissions

use crate::auth::api_key::{preview, ApiKeyHash};
use crate::config::Config;
use crate::core::errors::GatewayError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tracing::{info, warn};

/// Registered API key metadata
///
/// The raw key is not part of the record; only `key_preview` is kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub display_name: String,
    pub quota_per_window: u32,
    pub permissions: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub key_preview: String,
}

impl ApiKeyRecord {
    pub fn new(
        display_name: impl Into<String>,
        quota_per_window: u32,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, GatewayError> {
        if quota_per_window == 0 {
            return Err(GatewayError::ValidationError(
                "quota_per_window must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            display_name: display_name.into(),
            quota_per_window,
            permissions: permissions.into_iter().map(Into::into).collect(),
            created_at: Utc::now(),
            key_preview: String::new(),
        })
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// One entry of a YAML key file
#[derive(Debug, Deserialize)]
struct KeyFileEntry {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    key_hash: Option<String>,
    name: String,
    rate_limit: u32,
    #[serde(default = "default_permissions")]
    permissions: Vec<String>,
    #[serde(default)]
    created: Option<NaiveDate>,
}

fn default_permissions() -> Vec<String> {
    vec!["read".to_string(), "write".to_string()]
}

/// Registry of valid API keys
///
/// Keys are stored by salted digest. Mutation is rare and administrative, so a
/// single `RwLock` gives many-reader/single-writer access.
pub struct KeyRegistry {
    salt: String,
    default_quota: u32,
    keys: RwLock<HashMap<ApiKeyHash, ApiKeyRecord>>,
}

impl KeyRegistry {
    /// Create an empty registry
    ///
    /// `default_quota` is returned by [`quota_for`](Self::quota_for) for unknown keys.
    pub fn new(salt: impl Into<String>, default_quota: u32) -> Self {
        Self {
            salt: salt.into(),
            default_quota,
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Build the registry the server starts with
    ///
    /// Sources, in order: the key file, `MCP_API_KEY`, and (in debug mode)
    /// the development keys. An empty registry is allowed but logged.
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let registry = Self::new(config.api_key_salt.clone(), config.default_rate_limit);

        if let Some(ref path) = config.api_keys_path {
            registry.load_yaml(path)?;
        }

        if let Some(ref key) = config.mcp_api_key {
            let record = ApiKeyRecord::new("Environment Key", 500, ["read", "write"])?;
            if registry.add(key, record) {
                info!(key_preview = %preview(key), "Environment API key registered");
            }
        }

        if config.debug {
            registry.seed_development_keys();
            info!("Development API keys registered");
        }

        for record in registry.list() {
            info!(
                name = %record.display_name,
                key_preview = %record.key_preview,
                quota = record.quota_per_window,
                "API key active"
            );
        }

        if registry.is_empty() {
            warn!("No API keys registered; every authenticated endpoint will reject requests");
        }
        Ok(registry)
    }

    fn digest(&self, key: &str) -> ApiKeyHash {
        ApiKeyHash::salted(key, &self.salt)
    }

    /// True iff `key` is registered and not revoked
    pub fn validate(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        let digest = self.digest(key);
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&digest)
    }

    pub fn lookup(&self, key: &str) -> Option<ApiKeyRecord> {
        let digest = self.digest(key);
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&digest)
            .cloned()
    }

    /// Register a key; returns false if it already exists (never overwrites)
    pub fn add(&self, key: &str, mut record: ApiKeyRecord) -> bool {
        record.key_preview = preview(key);
        self.add_hashed(self.digest(key), record)
    }

    /// Register a key by its precomputed salted digest
    pub fn add_hashed(&self, digest: ApiKeyHash, record: ApiKeyRecord) -> bool {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        if keys.contains_key(&digest) {
            return false;
        }
        keys.insert(digest, record);
        true
    }

    /// Remove a key; returns false if it was not registered
    pub fn revoke(&self, key: &str) -> bool {
        let digest = self.digest(key);
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&digest)
            .is_some()
    }

    /// Quota of `key`, or the configured default when the key is unknown
    pub fn quota_for(&self, key: &str) -> u32 {
        self.lookup(key)
            .map(|record| record.quota_per_window)
            .unwrap_or(self.default_quota)
    }

    pub fn default_quota(&self) -> u32 {
        self.default_quota
    }

    /// All records, ordered by display name
    pub fn list(&self) -> Vec<ApiKeyRecord> {
        let mut records: Vec<ApiKeyRecord> = self
            .keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        records
    }

    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load keys from a YAML file: a list of `{key | key_hash, name, rate_limit, permissions, created}`
    ///
    /// `key_hash` entries must be salted with this registry's salt.
    /// Returns the number of keys added; duplicates are skipped with a warning.
    pub fn load_yaml(&self, path: &Path) -> Result<usize, GatewayError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::ConfigurationError(format!("Cannot read key file {:?}: {}", path, e))
        })?;
        self.load_yaml_str(&raw)
    }

    pub fn load_yaml_str(&self, raw: &str) -> Result<usize, GatewayError> {
        let entries: Vec<KeyFileEntry> = serde_yaml::from_str(raw).map_err(|e| {
            GatewayError::ConfigurationError(format!("Invalid key file: {}", e))
        })?;

        let mut added = 0;
        for entry in entries {
            let mut record = ApiKeyRecord::new(entry.name.clone(), entry.rate_limit, entry.permissions)
                .map_err(|e| {
                    GatewayError::ConfigurationError(format!("Key '{}': {}", entry.name, e.user_message()))
                })?;
            if let Some(created) = entry.created.and_then(|d| d.and_hms_opt(0, 0, 0)) {
                record.created_at = created.and_utc();
            }

            let inserted = match (entry.key, entry.key_hash) {
                (Some(key), None) => self.add(&key, record),
                (None, Some(hash)) => {
                    let digest = ApiKeyHash::from_hash_string(&hash).map_err(|e| {
                        GatewayError::ConfigurationError(format!("Key '{}': {}", entry.name, e))
                    })?;
                    record.key_preview = format!("sha256:{}...", &digest.as_str()[..8]);
                    self.add_hashed(digest, record)
                }
                _ => {
                    return Err(GatewayError::ConfigurationError(format!(
                        "Key '{}' must set exactly one of `key` or `key_hash`",
                        entry.name
                    )))
                }
            };

            if inserted {
                added += 1;
            } else {
                warn!(name = %entry.name, "Duplicate API key in key file, skipping");
            }
        }

        info!(count = added, "API keys loaded from key file");
        Ok(added)
    }

    /// Seed the well-known development keys
    pub fn seed_development_keys(&self) {
        let seeds = [
            ("mcp-key-dev-123", "Development Key", 100),
            ("mcp-key-prod-456", "Production Key", 1000),
        ];
        for (key, name, quota) in seeds {
            if let Ok(record) = ApiKeyRecord::new(name, quota, ["read", "write"]) {
                self.add(key, record);
            }
        }
    }
}
