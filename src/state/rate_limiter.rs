// Sliding window rate limiter with transparent Redis-to-memory fallback

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::api_key::ApiKeyHash;
use crate::core::errors::GatewayError;
use crate::core::resilience::{create_circuit_breaker, execute_with_cb, BackendCircuitBreaker};
use crate::metrics::GatewayMetrics;
use crate::state::memory_store::MemoryWindowStore;
use crate::state::{WindowDecision, WindowStore};
use crate::utils::time;

/// Hex characters of the key digest kept in the partition key
const CLIENT_KEY_DIGEST_CHARS: usize = 16;

/// Result of one admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub admitted: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds at which the current window has fully rolled over
    pub reset_at: u64,
    /// Store that answered: "redis" or "memory"
    pub backend: &'static str,
}

/// Sliding window limiter over an optional shared store
///
/// When the primary store errors, times out or has its circuit open, the same
/// decision is answered from the process-local store. Callers never see a
/// backend failure.
pub struct SlidingWindowLimiter {
    primary: Option<Arc<dyn WindowStore>>,
    fallback: MemoryWindowStore,
    breaker: BackendCircuitBreaker,
    window_secs: u64,
    metrics: Option<Arc<GatewayMetrics>>,
    /// Set while decisions are answered from memory after a primary failure
    degraded: AtomicBool,
}

impl SlidingWindowLimiter {
    /// Limiter backed only by process memory
    pub fn in_memory(window_secs: u64) -> Self {
        Self::new(None, window_secs)
    }

    pub fn new(primary: Option<Arc<dyn WindowStore>>, window_secs: u64) -> Self {
        Self {
            primary,
            fallback: MemoryWindowStore::new(),
            breaker: create_circuit_breaker(),
            window_secs,
            metrics: None,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn with_circuit_breaker(mut self, breaker: BackendCircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Name of the configured shared store, if any
    pub fn primary_backend(&self) -> Option<&'static str> {
        self.primary.as_ref().map(|p| p.name())
    }

    /// True while the primary store is failing and memory answers instead
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Health of the shared store: `None` when not configured
    pub async fn primary_healthy(&self) -> Option<bool> {
        match &self.primary {
            Some(primary) => Some(primary.ping().await.is_ok()),
            None => None,
        }
    }

    /// Decide whether `client_id` may make one more request now
    pub async fn admit(&self, client_id: &str, quota: u32) -> Admission {
        self.admit_at(client_id, quota, time::now()).await
    }

    /// Decide at an explicit instant (epoch seconds)
    pub async fn admit_at(&self, client_id: &str, quota: u32, now: f64) -> Admission {
        let window = self.window_secs;

        let (decision, backend) = match &self.primary {
            Some(primary) => {
                match execute_with_cb(&self.breaker, || primary.admit(client_id, quota, window, now)).await {
                    Ok(decision) => {
                        self.mark_recovered(primary.name());
                        (decision, primary.name())
                    }
                    Err(e) => {
                        self.mark_degraded(primary.name(), &e);
                        debug!(
                            backend = primary.name(),
                            client_id = %client_id,
                            error = %e,
                            "Answering rate limit decision from memory"
                        );
                        if let Some(metrics) = &self.metrics {
                            metrics.record_fallback();
                        }
                        (self.fallback.record(client_id, quota, window, now).await, self.fallback.name())
                    }
                }
            }
            None => (self.fallback.record(client_id, quota, window, now).await, self.fallback.name()),
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_admission(backend, decision.admitted);
        }
        debug!(
            client_id = %client_id,
            admitted = decision.admitted,
            occupancy = decision.occupancy,
            quota,
            backend,
            "Rate limit decision"
        );

        self.admission(decision, quota, now, backend)
    }

    /// Quota left for `client_id` right now, without recording a request
    pub async fn remaining(&self, client_id: &str, quota: u32) -> u32 {
        self.remaining_at(client_id, quota, time::now()).await
    }

    pub async fn remaining_at(&self, client_id: &str, quota: u32, now: f64) -> u32 {
        let window = self.window_secs;
        if let Some(primary) = &self.primary {
            match execute_with_cb(&self.breaker, || primary.remaining(client_id, quota, window, now)).await {
                Ok(remaining) => {
                    self.mark_recovered(primary.name());
                    return remaining;
                }
                Err(e) => {
                    self.mark_degraded(primary.name(), &e);
                    debug!(backend = primary.name(), error = %e, "Answering remaining-quota lookup from memory");
                }
            }
        }
        self.fallback.peek_remaining(client_id, quota, window, now).await
    }

    /// Warn once per outage rather than once per request
    fn mark_degraded(&self, backend: &str, error: &GatewayError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(backend, error = %error, "Rate limit store unavailable, falling back to memory");
        }
    }

    fn mark_recovered(&self, backend: &str) {
        if self.degraded.swap(false, Ordering::Relaxed) {
            info!(backend, "Rate limit store recovered");
        }
    }

    fn admission(&self, decision: WindowDecision, quota: u32, now: f64, backend: &'static str) -> Admission {
        Admission {
            admitted: decision.admitted,
            limit: quota,
            remaining: decision.remaining(quota),
            reset_at: now.max(0.0).floor() as u64 + self.window_secs,
            backend,
        }
    }
}

/// Rate-limit partition key for a request
///
/// Prefers the API key (as a truncated digest, never the raw key), then the
/// first address of a forwarded-for chain, then the peer address.
pub fn client_identifier(api_key: Option<&str>, forwarded_for: Option<&str>, peer: Option<IpAddr>) -> String {
    if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
        let digest = ApiKeyHash::from_api_key(key);
        return format!("api_key:{}", &digest.as_str()[..CLIENT_KEY_DIGEST_CHARS]);
    }

    let forwarded = forwarded_for
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return format!("ip:{}", ip);
    }

    match peer {
        Some(ip) => format!("ip:{}", ip),
        None => "ip:unknown".to_string(),
    }
}
