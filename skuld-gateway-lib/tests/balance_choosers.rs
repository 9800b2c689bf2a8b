use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use skuld_gateway_lib::balance::{
    build_chooser, Algorithm, Chooser, RequestContext, SourceHash, WeightedRoundRobin,
};
use skuld_gateway_lib::error::GatewayError;
use skuld_gateway_lib::stats::{Instance, InstanceEntry, StatsRegistry};

fn candidates(specs: &[(&str, u32)]) -> (StatsRegistry, Vec<Arc<InstanceEntry>>) {
    let registry = StatsRegistry::new();
    for (id, weight) in specs {
        registry
            .register(
                "r1",
                Instance {
                    service_id: "svc".to_string(),
                    instance_id: id.to_string(),
                    address: format!("{id}:9000"),
                    weight: *weight,
                },
            )
            .unwrap();
    }
    let snapshot = registry.snapshot("r1").unwrap().as_ref().clone();
    (registry, snapshot)
}

fn ctx() -> RequestContext {
    RequestContext::default()
}

#[test]
fn test_round_robin_visits_each_once_per_cycle() {
    let (_registry, entries) = candidates(&[("a", 1), ("b", 1), ("c", 1)]);
    let chooser = build_chooser(Algorithm::RoundRobin);

    for _ in 0..4 {
        let mut seen = Vec::new();
        for _ in 0..entries.len() {
            seen.push(chooser.choose(&entries, &ctx()).unwrap().instance_id.clone());
        }
        seen.sort();
        assert_eq!(seen, ["a", "b", "c"]);
    }
}

#[test]
fn test_choosers_fail_on_empty_candidates() {
    let empty: Vec<Arc<InstanceEntry>> = Vec::new();
    for algorithm in [
        Algorithm::RoundRobin,
        Algorithm::Random,
        Algorithm::LeastConn,
        Algorithm::LeastTime,
        Algorithm::SourceHash,
        Algorithm::DestinationHash,
        Algorithm::WeightedRoundRobin,
        Algorithm::WeightedRandom,
        Algorithm::WeightedLeastConn,
        Algorithm::WeightedLeastTime,
    ] {
        let chooser = build_chooser(algorithm);
        assert!(
            matches!(
                chooser.choose(&empty, &ctx()).unwrap_err(),
                GatewayError::NoAvailableInstance(_)
            ),
            "{algorithm:?} should fail on empty candidates"
        );
    }
}

#[test]
fn test_random_stays_within_candidates() {
    let (_registry, entries) = candidates(&[("a", 1), ("b", 1)]);
    let chooser = build_chooser(Algorithm::Random);
    for _ in 0..100 {
        let picked = chooser.choose(&entries, &ctx()).unwrap();
        assert!(picked.instance_id == "a" || picked.instance_id == "b");
    }
}

#[test]
fn test_least_conn_picks_minimum() {
    let (registry, entries) = candidates(&[("a", 1), ("b", 1), ("c", 1)]);
    registry.record_start("r1", "a").unwrap();
    registry.record_start("r1", "a").unwrap();
    registry.record_start("r1", "b").unwrap();

    let chooser = build_chooser(Algorithm::LeastConn);
    assert_eq!(chooser.choose(&entries, &ctx()).unwrap().instance_id, "c");
}

#[test]
fn test_least_conn_tie_goes_to_first_declared() {
    let (registry, entries) = candidates(&[("a", 1), ("b", 1), ("c", 1)]);
    registry.record_start("r1", "a").unwrap();

    // b and c tie at zero; b was declared first.
    let chooser = build_chooser(Algorithm::LeastConn);
    assert_eq!(chooser.choose(&entries, &ctx()).unwrap().instance_id, "b");
}

#[test]
fn test_weighted_least_conn_divides_by_weight() {
    let (registry, entries) = candidates(&[("heavy", 4), ("light", 1)]);
    // heavy: 2 conns / weight 4 = 0.5; light: 1 conn / weight 1 = 1.0
    registry.record_start("r1", "heavy").unwrap();
    registry.record_start("r1", "heavy").unwrap();
    registry.record_start("r1", "light").unwrap();

    let chooser = build_chooser(Algorithm::WeightedLeastConn);
    assert_eq!(chooser.choose(&entries, &ctx()).unwrap().instance_id, "heavy");
}

#[test]
fn test_least_time_favors_zero_request_instances() {
    let (registry, entries) = candidates(&[("seasoned", 1), ("fresh", 1)]);
    registry.record_start("r1", "seasoned").unwrap();
    registry
        .record_end("r1", "seasoned", Duration::from_millis(5))
        .unwrap();

    let chooser = build_chooser(Algorithm::LeastTime);
    assert_eq!(chooser.choose(&entries, &ctx()).unwrap().instance_id, "fresh");
}

#[test]
fn test_least_time_picks_lower_average() {
    let (registry, entries) = candidates(&[("slow", 1), ("fast", 1)]);
    registry.record_start("r1", "slow").unwrap();
    registry.record_end("r1", "slow", Duration::from_millis(200)).unwrap();
    registry.record_start("r1", "fast").unwrap();
    registry.record_end("r1", "fast", Duration::from_millis(20)).unwrap();

    let chooser = build_chooser(Algorithm::LeastTime);
    assert_eq!(chooser.choose(&entries, &ctx()).unwrap().instance_id, "fast");
}

#[test]
fn test_source_hash_is_stable() {
    let (_registry, entries) = candidates(&[("a", 1), ("b", 1), ("c", 1)]);
    let chooser = SourceHash;
    let ctx = RequestContext { source: Some("192.0.2.7".to_string()), ..Default::default() };

    let first = chooser.choose(&entries, &ctx).unwrap();
    for _ in 0..10 {
        assert_eq!(chooser.choose(&entries, &ctx).unwrap().instance_id, first.instance_id);
    }
}

#[test]
fn test_destination_hash_differs_by_key_space() {
    let (_registry, entries) = candidates(&[("a", 1), ("b", 1), ("c", 1), ("d", 1), ("e", 1)]);
    let chooser = build_chooser(Algorithm::DestinationHash);

    // Stability per key; different keys are free to differ.
    for key in ["svc-one", "svc-two", "svc-three"] {
        let ctx = RequestContext { destination: Some(key.to_string()), ..Default::default() };
        let first = chooser.choose(&entries, &ctx).unwrap();
        assert_eq!(chooser.choose(&entries, &ctx).unwrap().instance_id, first.instance_id);
    }
}

#[test]
fn test_weighted_round_robin_smooth_schedule() {
    let (_registry, entries) = candidates(&[("a", 5), ("b", 1), ("c", 1)]);
    let chooser = WeightedRoundRobin::new();

    let picks: Vec<String> = (0..7)
        .map(|_| chooser.choose(&entries, &ctx()).unwrap().instance_id.clone())
        .collect();
    // Classic smooth WRR interleaving for weights 5/1/1.
    assert_eq!(picks, ["a", "a", "b", "a", "c", "a", "a"]);

    // The schedule repeats each full cycle.
    let again: Vec<String> = (0..7)
        .map(|_| chooser.choose(&entries, &ctx()).unwrap().instance_id.clone())
        .collect();
    assert_eq!(again, picks);
}

#[test]
fn test_weighted_round_robin_resets_on_topology_change() {
    let (_registry, entries) = candidates(&[("a", 2), ("b", 1)]);
    let chooser = WeightedRoundRobin::new();
    chooser.choose(&entries, &ctx()).unwrap();

    let (_registry2, replaced) = candidates(&[("x", 1), ("y", 1)]);
    let picked = chooser.choose(&replaced, &ctx()).unwrap();
    assert!(picked.instance_id == "x" || picked.instance_id == "y");
}

#[test]
fn test_weighted_random_is_weight_proportional() {
    let (_registry, entries) = candidates(&[("w1", 1), ("w2", 2), ("w3", 3)]);
    let chooser = build_chooser(Algorithm::WeightedRandom);

    let draws = 100_000usize;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..draws {
        let picked = chooser.choose(&entries, &ctx()).unwrap();
        *counts.entry(picked.instance_id.clone()).or_default() += 1;
    }

    let total_weight = 6.0;
    for (id, weight) in [("w1", 1.0), ("w2", 2.0), ("w3", 3.0)] {
        let expected = draws as f64 * weight / total_weight;
        let observed = counts[id] as f64;
        let deviation = (observed - expected).abs() / expected;
        assert!(
            deviation < 0.05,
            "{id}: observed {observed}, expected {expected} (deviation {deviation:.3})"
        );
    }
}
