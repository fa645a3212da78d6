// Rate-limit window storage: shared interface and backends

use async_trait::async_trait;

use crate::core::errors::GatewayError;

pub mod memory_store;
pub mod rate_limiter;
pub mod redis_store;

/// Outcome of one sliding-window step against a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDecision {
    pub admitted: bool,
    /// Live timestamps for the client after the step
    pub occupancy: u32,
}

impl WindowDecision {
    /// Quota left after this step, never negative
    pub fn remaining(&self, quota: u32) -> u32 {
        quota.saturating_sub(self.occupancy)
    }
}

/// Storage backend for per-client admission timestamps
///
/// Every implementation applies the same algorithm: drop timestamps
/// `<= now - window_secs`, count the rest, and record `now` only when the
/// count is strictly below `quota`. The four steps are atomic per client.
#[async_trait]
pub trait WindowStore: Send + Sync {
    async fn admit(
        &self,
        client_id: &str,
        quota: u32,
        window_secs: u64,
        now: f64,
    ) -> Result<WindowDecision, GatewayError>;

    /// Quota left for `client_id` at `now` without recording anything
    async fn remaining(
        &self,
        client_id: &str,
        quota: u32,
        window_secs: u64,
        now: f64,
    ) -> Result<u32, GatewayError>;

    async fn ping(&self) -> Result<(), GatewayError>;

    /// Short label used in logs, metrics and health output
    fn name(&self) -> &'static str;
}
