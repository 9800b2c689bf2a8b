use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use skuld_gateway_lib::error::GatewayError;
use skuld_gateway_lib::limit::{
    headers, CounterStore, MemoryCounterStore, MemoryStrategyStore, QuotaLimiter, QuotaStrategy,
};
use skuld_gateway_lib::{EventChannel, GatewayEvent, LimiterKind};

struct FailingStore;

#[async_trait]
impl CounterStore for FailingStore {
    async fn incr_and_get(
        &self,
        _bucket: &str,
        _member: &str,
        _ttl: Duration,
    ) -> skuld_gateway_lib::Result<i64> {
        Err(GatewayError::Store(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "simulated outage",
        ))))
    }
}

fn daily(capacity: u64) -> QuotaStrategy {
    QuotaStrategy {
        capacity,
        cycle_pattern: "%Y-%m-%d".to_string(),
        retain_secs: 172_800,
        emit_headers: true,
    }
}

fn limiter(store: Arc<dyn CounterStore>, events: &EventChannel) -> QuotaLimiter {
    QuotaLimiter::new(
        store,
        Arc::new(MemoryStrategyStore::new()),
        "test",
        events.clone(),
        None,
    )
}

#[tokio::test]
async fn test_quota_counts_down_then_denies() {
    let events = EventChannel::new(64);
    let limiter = limiter(Arc::new(MemoryCounterStore::new()), &events);
    let strategy = daily(3);

    for expected in [2, 1, 0] {
        let result = limiter
            .is_allowed("r1", "client-1", "/orders", &strategy)
            .await
            .unwrap();
        assert!(result.allowed);
        assert_eq!(result.tokens_left, expected);
    }

    let denied = limiter
        .is_allowed("r1", "client-1", "/orders", &strategy)
        .await
        .unwrap();
    assert!(!denied.allowed);
    assert_eq!(denied.tokens_left, -1);
}

#[tokio::test]
async fn test_quota_denial_emits_audit_event() {
    let events = EventChannel::new(64);
    let mut rx = events.subscribe();
    let limiter = limiter(Arc::new(MemoryCounterStore::new()), &events);
    let strategy = daily(1);

    limiter.is_allowed("r1", "client-1", "/orders", &strategy).await.unwrap();
    limiter.is_allowed("r1", "client-1", "/orders", &strategy).await.unwrap();

    let mut hits = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let GatewayEvent::QuotaExceeded { route, key, path } = event {
            hits.push((route, key, path));
        }
    }
    assert_eq!(
        hits,
        [("r1".to_string(), "client-1".to_string(), "/orders".to_string())]
    );
}

#[tokio::test]
async fn test_quota_rolls_over_at_cycle_boundary() {
    let events = EventChannel::new(64);
    let limiter = limiter(Arc::new(MemoryCounterStore::new()), &events);
    // Second-granularity cycles so the boundary is reachable in a test.
    let strategy = QuotaStrategy {
        capacity: 3,
        cycle_pattern: "%Y-%m-%dT%H:%M:%S".to_string(),
        retain_secs: 60,
        emit_headers: false,
    };

    let first = limiter
        .is_allowed("r1", "client-1", "/", &strategy)
        .await
        .unwrap();
    assert!(first.allowed);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    // A fresh cycle: the full budget is available again.
    let after = limiter
        .is_allowed("r1", "client-1", "/", &strategy)
        .await
        .unwrap();
    assert!(after.allowed);
    assert_eq!(after.tokens_left, strategy.capacity as i64 - 1);
}

#[tokio::test]
async fn test_quota_invalid_pattern_fails_open_with_raw_pattern() {
    let events = EventChannel::new(64);
    let limiter = limiter(Arc::new(MemoryCounterStore::new()), &events);
    let strategy = QuotaStrategy {
        capacity: 3,
        cycle_pattern: "%Q-nonsense".to_string(),
        retain_secs: 60,
        emit_headers: true,
    };

    let result = limiter
        .is_allowed("r1", "client-1", "/", &strategy)
        .await
        .unwrap();
    assert!(result.allowed);
    assert_eq!(result.tokens_left, -1);

    let window = result
        .headers
        .iter()
        .find(|(k, _)| k == headers::QUOTA.window)
        .map(|(_, v)| v.clone())
        .unwrap();
    assert_eq!(window, "%Q-nonsense");
}

#[tokio::test]
async fn test_quota_fails_open_on_store_error() {
    let events = EventChannel::new(64);
    let mut rx = events.subscribe();
    let limiter = limiter(Arc::new(FailingStore), &events);
    let strategy = daily(1);

    let result = limiter
        .is_allowed("r1", "client-1", "/", &strategy)
        .await
        .unwrap();
    assert!(result.allowed);
    assert_eq!(result.tokens_left, -1);

    let mut failures = 0;
    while let Ok(event) = rx.try_recv() {
        if let GatewayEvent::StoreFailure { kind, .. } = event {
            assert_eq!(kind, LimiterKind::Quota);
            failures += 1;
        }
    }
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn test_quota_strategy_store_overrides_default() {
    let events = EventChannel::new(64);
    let strategies = Arc::new(MemoryStrategyStore::new());
    strategies.set_quota("r1", "vip", daily(2));
    let limiter = QuotaLimiter::new(
        Arc::new(MemoryCounterStore::new()),
        strategies,
        "test",
        events.clone(),
        None,
    );

    let default = daily(1);
    assert!(limiter.is_allowed("r1", "vip", "/", &default).await.unwrap().allowed);
    assert!(limiter.is_allowed("r1", "vip", "/", &default).await.unwrap().allowed);
    assert!(!limiter.is_allowed("r1", "vip", "/", &default).await.unwrap().allowed);
}
