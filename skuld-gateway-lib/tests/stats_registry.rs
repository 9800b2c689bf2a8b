use std::sync::Arc;
use std::thread;
use std::time::Duration;

use skuld_gateway_lib::error::GatewayError;
use skuld_gateway_lib::stats::{InFlightGuard, Instance, StatsRegistry};

fn instance(id: &str, weight: u32) -> Instance {
    Instance {
        service_id: "svc".to_string(),
        instance_id: id.to_string(),
        address: format!("10.0.0.1:{}", 9000 + weight),
        weight,
    }
}

#[test]
fn test_register_and_snapshot_order() {
    let registry = StatsRegistry::new();
    registry.register("r1", instance("a", 1)).unwrap();
    registry.register("r1", instance("b", 1)).unwrap();
    registry.register("r1", instance("c", 1)).unwrap();

    let snapshot = registry.snapshot("r1").unwrap();
    let ids: Vec<_> = snapshot
        .iter()
        .map(|e| e.instance.instance_id.as_str())
        .collect();
    assert_eq!(ids, ["a", "b", "c"]);
}

#[test]
fn test_register_duplicate_rejected() {
    let registry = StatsRegistry::new();
    registry.register("r1", instance("a", 1)).unwrap();
    let err = registry.register("r1", instance("a", 1)).unwrap_err();
    assert!(matches!(err, GatewayError::DuplicateInstance { .. }));
}

#[test]
fn test_unknown_route_is_not_found() {
    let registry = StatsRegistry::new();
    assert!(matches!(
        registry.snapshot("nope").unwrap_err(),
        GatewayError::RouteNotFound(_)
    ));
    assert!(matches!(
        registry.record_start("nope", "a").unwrap_err(),
        GatewayError::RouteNotFound(_)
    ));
    assert!(matches!(
        registry.record_end("nope", "a", Duration::from_millis(1)).unwrap_err(),
        GatewayError::RouteNotFound(_)
    ));
}

#[test]
fn test_record_start_end_updates_stats() {
    let registry = StatsRegistry::new();
    registry.register("r1", instance("a", 1)).unwrap();

    registry.record_start("r1", "a").unwrap();
    registry.record_start("r1", "a").unwrap();
    let entry = registry.entry("r1", "a").unwrap();
    assert_eq!(entry.stats.in_flight(), 2);

    registry.record_end("r1", "a", Duration::from_millis(30)).unwrap();
    registry.record_end("r1", "a", Duration::from_millis(10)).unwrap();
    assert_eq!(entry.stats.in_flight(), 0);
    assert_eq!(entry.stats.requests(), 2);
    assert_eq!(entry.stats.latency_total_ms(), 40);
    assert!((entry.stats.avg_latency_ms() - 20.0).abs() < f64::EPSILON);
}

#[test]
fn test_in_flight_never_negative() {
    let registry = StatsRegistry::new();
    registry.register("r1", instance("a", 1)).unwrap();

    // Ends without matching starts must not drive the counter below zero.
    registry.record_end("r1", "a", Duration::from_millis(1)).unwrap();
    registry.record_end("r1", "a", Duration::from_millis(1)).unwrap();
    let entry = registry.entry("r1", "a").unwrap();
    assert_eq!(entry.stats.in_flight(), 0);
}

#[test]
fn test_concurrent_start_end_returns_to_zero() {
    let registry = Arc::new(StatsRegistry::new());
    registry.register("r1", instance("a", 1)).unwrap();

    let threads: u64 = 8;
    let iterations: u64 = 500;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..iterations {
                    registry.record_start("r1", "a").unwrap();
                    let entry = registry.entry("r1", "a").unwrap();
                    assert!(entry.stats.in_flight() >= 0);
                    registry
                        .record_end("r1", "a", Duration::from_millis(1))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let entry = registry.entry("r1", "a").unwrap();
    assert_eq!(entry.stats.in_flight(), 0);
    assert_eq!(entry.stats.requests(), threads * iterations);
}

#[test]
fn test_update_preserves_surviving_stats() {
    let registry = StatsRegistry::new();
    registry.register("r1", instance("a", 1)).unwrap();
    registry.register("r1", instance("b", 1)).unwrap();
    registry.record_start("r1", "a").unwrap();

    // Replace b with c, keep a as-is.
    registry.update("r1", vec![instance("a", 1), instance("c", 1)]);

    let snapshot = registry.snapshot("r1").unwrap();
    let ids: Vec<_> = snapshot
        .iter()
        .map(|e| e.instance.instance_id.as_str())
        .collect();
    assert_eq!(ids, ["a", "c"]);
    assert_eq!(registry.entry("r1", "a").unwrap().stats.in_flight(), 1);
    assert!(registry.entry("r1", "b").is_err());
}

#[test]
fn test_deregister_removes_instance() {
    let registry = StatsRegistry::new();
    registry.register("r1", instance("a", 1)).unwrap();
    registry.deregister("r1", "a").unwrap();
    assert!(matches!(
        registry.deregister("r1", "a").unwrap_err(),
        GatewayError::InstanceNotFound { .. }
    ));
    assert!(registry.snapshot("r1").unwrap().is_empty());
}

#[test]
fn test_guard_releases_on_drop() {
    let registry = StatsRegistry::new();
    registry.register("r1", instance("a", 1)).unwrap();
    let entry = registry.entry("r1", "a").unwrap();

    {
        let _guard = InFlightGuard::new(entry.clone(), None);
        assert_eq!(entry.stats.in_flight(), 1);
        // Dropped without an explicit completion, as a cancelled request
        // would be.
    }

    assert_eq!(entry.stats.in_flight(), 0);
    assert_eq!(entry.stats.requests(), 1);
}

#[test]
fn test_mark_alive_flips_liveness() {
    let registry = StatsRegistry::new();
    registry.register("r1", instance("a", 1)).unwrap();
    let entry = registry.entry("r1", "a").unwrap();
    assert!(entry.stats.is_alive());

    registry.mark_alive("r1", "a", false).unwrap();
    assert!(!entry.stats.is_alive());

    registry.mark_alive("r1", "a", true).unwrap();
    assert!(entry.stats.is_alive());
}
