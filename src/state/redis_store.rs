// Redis-backed sliding window store

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use std::future::Future;
use tokio::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::core::errors::GatewayError;
use crate::core::resilience::RetryPolicy;
use crate::state::{WindowDecision, WindowStore};

/// Purge, count, conditional insert and expiry run as one server-side unit,
/// so concurrent callers for the same client cannot both observe a free slot.
const SLIDING_WINDOW_SCRIPT: &str = r"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local quota = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
local admitted = 0
if count < quota then
    redis.call('ZADD', key, now, member)
    count = count + 1
    admitted = 1
end
redis.call('EXPIRE', key, window)
return {admitted, count}
";

/// Redis store for rate-limit windows
///
/// Each client owns a sorted set `rate_limit:<client_id>` scored by admission time.
pub struct RedisWindowStore {
    connection_manager: ConnectionManager,
    script: Script,
    operation_timeout: Duration,
}

impl RedisWindowStore {
    /// Connect with retries, verifying the connection with PING
    pub async fn connect(
        redis_url: &str,
        connection_timeout: Duration,
        operation_timeout: Duration,
        retry: &RetryPolicy,
    ) -> Result<Self, GatewayError> {
        let store = retry
            .run(|| Self::try_connect(redis_url, connection_timeout, operation_timeout))
            .await?;
        info!(operation_timeout_ms = operation_timeout.as_millis() as u64, "Redis rate limit store connected");
        Ok(store)
    }

    async fn try_connect(
        redis_url: &str,
        connection_timeout: Duration,
        operation_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        // Validates URL format before any network activity
        let client = Client::open(redis_url).map_err(|e| {
            GatewayError::ConfigurationError(format!("Invalid Redis URL: {}", e))
        })?;

        let connection_manager = tokio::time::timeout(connection_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                GatewayError::BackendUnavailable(format!(
                    "Redis connection timed out after {}s",
                    connection_timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                GatewayError::BackendUnavailable(format!("Failed to create Redis ConnectionManager: {}", e))
            })?;

        let store = Self {
            connection_manager,
            script: Script::new(SLIDING_WINDOW_SCRIPT),
            operation_timeout,
        };
        store.ping().await?;
        Ok(store)
    }

    fn key_for(client_id: &str) -> String {
        format!("rate_limit:{}", client_id)
    }

    /// Bound a Redis round trip by the operation timeout
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result.map_err(|e| {
                GatewayError::BackendUnavailable(format!("Redis {} failed: {}", op, e))
            }),
            Err(_) => Err(GatewayError::BackendUnavailable(format!(
                "Redis {} timed out after {}ms",
                op,
                self.operation_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn admit(
        &self,
        client_id: &str,
        quota: u32,
        window_secs: u64,
        now: f64,
    ) -> Result<WindowDecision, GatewayError> {
        let mut conn = self.connection_manager.clone();
        let key = Self::key_for(client_id);
        // Unique member so simultaneous admissions at the same instant are distinct
        let member = format!("{:.6}:{}", now, Uuid::new_v4());

        let mut invocation = self.script.key(&key);
        invocation
            .arg(format!("{:.6}", now))
            .arg(window_secs)
            .arg(quota)
            .arg(member);

        let reply: Vec<i64> = self
            .bounded("admit", invocation.invoke_async(&mut conn))
            .await?;

        match reply.as_slice() {
            [admitted, count] => Ok(WindowDecision {
                admitted: *admitted == 1,
                occupancy: (*count).max(0) as u32,
            }),
            other => Err(GatewayError::BackendUnavailable(format!(
                "Unexpected sliding window reply: {:?}",
                other
            ))),
        }
    }

    async fn remaining(
        &self,
        client_id: &str,
        quota: u32,
        window_secs: u64,
        now: f64,
    ) -> Result<u32, GatewayError> {
        let mut conn = self.connection_manager.clone();
        let key = Self::key_for(client_id);
        let window_start = format!("({:.6}", now - window_secs as f64);

        let mut cmd = redis::cmd("ZCOUNT");
        cmd.arg(&key).arg(window_start).arg("+inf");
        let occupancy: i64 = self.bounded("remaining", cmd.query_async(&mut conn)).await?;

        Ok(quota.saturating_sub(occupancy.max(0) as u32))
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        let mut conn = self.connection_manager.clone();
        let cmd = redis::cmd("PING");
        let result: String = self.bounded("ping", cmd.query_async(&mut conn)).await?;

        if result == "PONG" {
            Ok(())
        } else {
            Err(GatewayError::BackendUnavailable(format!(
                "Redis ping returned unexpected response: {}",
                result
            )))
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
