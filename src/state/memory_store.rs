// In-process sliding window store, used when Redis is absent or failing

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::errors::GatewayError;
use crate::state::{WindowDecision, WindowStore};

/// Seconds between opportunistic sweeps of fully expired clients
pub const DEFAULT_SWEEP_INTERVAL_SECS: f64 = 300.0;

struct Buckets {
    entries: HashMap<String, VecDeque<f64>>,
    last_sweep: Option<f64>,
}

/// Process-local window store
///
/// A single lock guards every client's timestamp list, so each decision
/// sees a fully purged view of that client's history.
pub struct MemoryWindowStore {
    buckets: Mutex<Buckets>,
    sweep_interval: f64,
}

impl Default for MemoryWindowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL_SECS)
    }

    pub fn with_sweep_interval(sweep_interval: f64) -> Self {
        Self {
            buckets: Mutex::new(Buckets {
                entries: HashMap::new(),
                last_sweep: None,
            }),
            sweep_interval,
        }
    }

    /// Apply one admission step; this backend cannot fail
    pub async fn record(&self, client_id: &str, quota: u32, window_secs: u64, now: f64) -> WindowDecision {
        let window_start = now - window_secs as f64;
        let mut buckets = self.buckets.lock().await;
        Self::maybe_sweep(&mut buckets, self.sweep_interval, window_start, now);

        let timestamps = buckets.entries.entry(client_id.to_string()).or_default();
        timestamps.retain(|&t| t > window_start);

        let admitted = (timestamps.len() as u64) < quota as u64;
        if admitted {
            timestamps.push_back(now);
        }
        let occupancy = timestamps.len() as u32;

        if timestamps.is_empty() {
            buckets.entries.remove(client_id);
        }

        WindowDecision { admitted, occupancy }
    }

    /// Quota left at `now` without recording anything
    pub async fn peek_remaining(&self, client_id: &str, quota: u32, window_secs: u64, now: f64) -> u32 {
        let window_start = now - window_secs as f64;
        let buckets = self.buckets.lock().await;
        let occupancy = buckets
            .entries
            .get(client_id)
            .map(|ts| ts.iter().filter(|&&t| t > window_start).count())
            .unwrap_or(0);
        quota.saturating_sub(occupancy as u32)
    }

    /// Number of clients currently holding timestamps
    pub async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.entries.len()
    }

    fn maybe_sweep(buckets: &mut Buckets, interval: f64, window_start: f64, now: f64) {
        let due = match buckets.last_sweep {
            None => true,
            Some(last) => now - last >= interval,
        };
        if !due {
            return;
        }

        let before = buckets.entries.len();
        buckets
            .entries
            .retain(|_, ts| ts.iter().any(|&t| t > window_start));
        buckets.last_sweep = Some(now);

        let removed = before - buckets.entries.len();
        if removed > 0 {
            debug!(removed, remaining = buckets.entries.len(), "Swept expired rate limit entries");
        }
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn admit(
        &self,
        client_id: &str,
        quota: u32,
        window_secs: u64,
        now: f64,
    ) -> Result<WindowDecision, GatewayError> {
        Ok(self.record(client_id, quota, window_secs, now).await)
    }

    async fn remaining(
        &self,
        client_id: &str,
        quota: u32,
        window_secs: u64,
        now: f64,
    ) -> Result<u32, GatewayError> {
        Ok(self.peek_remaining(client_id, quota, window_secs, now).await)
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
