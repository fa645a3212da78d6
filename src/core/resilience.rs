// Resilience helpers: circuit breaker for the Redis store and retry with backoff

use failsafe::futures::CircuitBreaker; // Import Async CircuitBreaker trait
use failsafe::{backoff, failure_policy, Config, Error, StateMachine};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::core::errors::GatewayError;

/// Circuit breaker guarding the distributed rate-limit store
///
/// Policy:
/// - 5 consecutive failures triggers OPEN state
/// - 5 seconds cool-down period before HALF-OPEN (retry)
pub type BackendCircuitBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::Constant>, ()>;

/// Create a new standard circuit breaker instance
pub fn create_circuit_breaker() -> BackendCircuitBreaker {
    create_circuit_breaker_with(5, Duration::from_secs(5))
}

/// Circuit breaker with a custom failure threshold and cool-down
pub fn create_circuit_breaker_with(failures: u32, cool_down: Duration) -> BackendCircuitBreaker {
    Config::new()
        .failure_policy(failure_policy::consecutive_failures(
            failures,
            backoff::constant(cool_down),
        ))
        .build()
}

/// Execute a fallible async operation within the circuit breaker protection
///
/// Both an inner failure and an open circuit surface as
/// `GatewayError::BackendUnavailable`; callers decide how to degrade.
pub async fn execute_with_cb<F, Fut, T, E>(
    cb: &BackendCircuitBreaker,
    operation: F,
) -> Result<T, GatewayError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match cb.call(operation()).await {
        Ok(val) => Ok(val),
        Err(Error::Inner(e)) => Err(GatewayError::BackendUnavailable(e.to_string())),
        Err(Error::Rejected) => Err(GatewayError::BackendUnavailable(
            "circuit breaker open".to_string(),
        )),
    }
}

/// Retry-with-backoff policy for any fallible async operation
///
/// Delay before retry `n` (0-based) is `base_delay * backoff_multiplier^n`.
/// The final failure is returned unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff_multiplier,
        }
    }

    /// Delay to wait after failed attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(0.0).powi(attempt as i32);
        self.base_delay.mul_f64(factor)
    }

    /// Run `operation` until it succeeds or `max_attempts` is exhausted
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 >= attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying..."
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
