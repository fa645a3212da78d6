// Sliding window limiter and stores through the public API

use mcp_gateway::core::resilience::create_circuit_breaker_with;
use mcp_gateway::metrics::GatewayMetrics;
use mcp_gateway::state::memory_store::MemoryWindowStore;
use mcp_gateway::state::rate_limiter::{client_identifier, SlidingWindowLimiter};
use mcp_gateway::state::WindowStore;
use std::sync::Arc;
use std::time::Duration;

use super::common::{FailingWindowStore, SwitchableWindowStore};

#[tokio::test]
async fn test_memory_store_through_trait() {
    let store: Arc<dyn WindowStore> = Arc::new(MemoryWindowStore::new());
    assert_eq!(store.name(), "memory");
    assert!(store.ping().await.is_ok());

    let first = store.admit("c", 3, 10, 100.0).await.unwrap();
    assert!(first.admitted);
    assert_eq!(first.remaining(3), 2);
    assert_eq!(store.remaining("c", 3, 10, 100.5).await.unwrap(), 2);
    assert_eq!(store.remaining("c", 3, 10, 110.0).await.unwrap(), 3);
}

#[tokio::test]
async fn test_boundary_timestamp_is_expired() {
    let limiter = SlidingWindowLimiter::in_memory(10);
    assert!(limiter.admit_at("c", 1, 100.0).await.admitted);
    assert!(!limiter.admit_at("c", 1, 109.999).await.admitted);
    // A timestamp exactly one window old no longer counts
    assert!(limiter.admit_at("c", 1, 110.0).await.admitted);
}

#[tokio::test]
async fn test_denials_do_not_extend_the_window() {
    let limiter = SlidingWindowLimiter::in_memory(10);
    assert!(limiter.admit_at("c", 1, 0.0).await.admitted);
    for t in 1..10 {
        assert!(!limiter.admit_at("c", 1, t as f64).await.admitted);
    }
    assert!(limiter.admit_at("c", 1, 10.5).await.admitted);
}

#[tokio::test]
async fn test_sweep_drops_idle_clients() {
    let store = MemoryWindowStore::with_sweep_interval(1.0);
    store.record("idle", 5, 10, 0.0).await;
    store.record("busy", 5, 10, 0.0).await;
    assert_eq!(store.tracked_clients().await, 2);

    store.record("busy", 5, 10, 20.0).await;
    assert_eq!(store.tracked_clients().await, 1);
}

#[tokio::test]
async fn test_fallback_shares_one_memory_view() {
    let store = Arc::new(FailingWindowStore::default());
    let metrics = Arc::new(GatewayMetrics::new().unwrap());
    let limiter = SlidingWindowLimiter::new(Some(store.clone() as Arc<dyn WindowStore>), 60)
        .with_circuit_breaker(create_circuit_breaker_with(100, Duration::from_secs(1)))
        .with_metrics(metrics.clone());

    assert_eq!(limiter.primary_backend(), Some("failing"));
    let a = limiter.admit_at("k", 1, 0.0).await;
    let b = limiter.admit_at("k", 1, 1.0).await;
    assert!(a.admitted);
    assert!(!b.admitted);
    assert_eq!(b.backend, "memory");
    assert_eq!(store.call_count(), 2);

    let rendered = metrics.render().unwrap();
    assert!(rendered.contains("mcp_gateway_rate_limit_fallbacks_total 2"));
}

#[tokio::test]
async fn test_primary_going_down_mid_run_keeps_answering() {
    let store = Arc::new(SwitchableWindowStore::default());
    let metrics = Arc::new(GatewayMetrics::new().unwrap());
    let limiter = SlidingWindowLimiter::new(Some(store.clone() as Arc<dyn WindowStore>), 60)
        .with_metrics(metrics.clone());

    let a = limiter.admit_at("c1", 2, 0.0).await;
    assert!(a.admitted);
    assert_eq!((a.backend, a.remaining), ("redis", 1));
    assert!(!limiter.is_degraded());

    store.set_down(true);
    let b = limiter.admit_at("c1", 2, 1.0).await;
    let c = limiter.admit_at("c1", 2, 2.0).await;
    let d = limiter.admit_at("c1", 2, 3.0).await;
    assert_eq!(
        [b.admitted, c.admitted, d.admitted],
        [true, true, false]
    );
    assert_eq!([b.remaining, c.remaining, d.remaining], [1, 0, 0]);
    assert!([b, c, d].iter().all(|x| x.backend == "memory"));
    assert!(limiter.is_degraded());
    assert_eq!(metrics.fallback_count(), 3);
    assert_eq!(limiter.primary_healthy().await, Some(false));

    // Recovery goes back to the shared store and its own history
    store.set_down(false);
    let e = limiter.admit_at("c1", 2, 4.0).await;
    assert_eq!((e.backend, e.admitted, e.remaining), ("redis", true, 0));
    assert!(!limiter.is_degraded());
}

#[tokio::test]
async fn test_remaining_never_negative() {
    let limiter = SlidingWindowLimiter::in_memory(60);
    for t in 0..5 {
        let admission = limiter.admit_at("c", 2, t as f64).await;
        assert!(admission.remaining <= 2);
    }
    assert_eq!(limiter.remaining_at("c", 2, 5.0).await, 0);
    // A smaller quota than current occupancy still reports zero
    assert_eq!(limiter.remaining_at("c", 1, 5.0).await, 0);
}

#[test]
fn test_client_identifier_hides_key_and_is_stable() {
    let a = client_identifier(Some("secret-key"), None, None);
    let b = client_identifier(Some("secret-key"), Some("1.1.1.1"), None);
    assert_eq!(a, b);
    assert!(!a.contains("secret"));
    assert_ne!(a, client_identifier(Some("other-key"), None, None));
}
