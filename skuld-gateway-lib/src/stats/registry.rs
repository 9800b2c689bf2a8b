use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;

use crate::error::{GatewayError, Result};

/// Immutable identity of a backend instance.
///
/// Replaced wholesale on topology refresh, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub service_id: String,
    pub instance_id: String,
    /// Network address (host:port format)
    pub address: String,
    /// Static weight, >= 1. Used by the weighted choosers.
    pub weight: u32,
}

/// Live runtime counters for one instance.
///
/// Each field is updated atomically on its own; there are no multi-field
/// transactions. Readers tolerate stale values.
#[derive(Debug)]
pub struct InstanceStats {
    in_flight: AtomicI64,
    latency_total_ms: AtomicU64,
    requests: AtomicU64,
    alive: AtomicBool,
    last_seen_ms: AtomicU64,
}

impl InstanceStats {
    fn new() -> Self {
        Self {
            in_flight: AtomicI64::new(0),
            latency_total_ms: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            alive: AtomicBool::new(true),
            last_seen_ms: AtomicU64::new(now_ms()),
        }
    }

    /// Mark a request as started against this instance.
    pub fn start_request(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// Mark a request as finished, recording its duration.
    ///
    /// The in-flight counter never goes below zero, even if ends are
    /// recorded without a matching start.
    pub fn end_request(&self, elapsed: Duration) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1).filter(|n| *n >= 0));
        self.latency_total_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn latency_total_ms(&self) -> u64 {
        self.latency_total_ms.load(Ordering::Relaxed)
    }

    /// Mean response time in milliseconds. Zero requests counts as zero.
    pub fn avg_latency_ms(&self) -> f64 {
        let requests = self.requests();
        if requests == 0 {
            return 0.0;
        }
        self.latency_total_ms() as f64 / requests as f64
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
        if alive {
            self.last_seen_ms.store(now_ms(), Ordering::Relaxed);
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn last_seen_ms(&self) -> u64 {
        self.last_seen_ms.load(Ordering::Relaxed)
    }
}

/// One instance together with its live stats.
#[derive(Debug)]
pub struct InstanceEntry {
    pub instance: Arc<Instance>,
    pub stats: InstanceStats,
}

impl InstanceEntry {
    fn new(instance: Instance) -> Arc<Self> {
        Arc::new(Self { instance: Arc::new(instance), stats: InstanceStats::new() })
    }
}

/// Read-mostly view of a route's instances, in declaration order.
pub type Snapshot = Arc<Vec<Arc<InstanceEntry>>>;

struct RouteTable {
    entries: ArcSwap<Vec<Arc<InstanceEntry>>>,
}

impl RouteTable {
    fn new() -> Self {
        Self { entries: ArcSwap::from_pointee(Vec::new()) }
    }

    fn find(&self, instance_id: &str) -> Option<Arc<InstanceEntry>> {
        self.entries
            .load()
            .iter()
            .find(|e| e.instance.instance_id == instance_id)
            .cloned()
    }
}

/// Local-process registry of per-route, per-instance runtime stats.
///
/// Not shared across cluster members; only in-process atomicity is needed.
/// Route tables are swapped atomically on topology changes, so choosers
/// read a consistent (possibly stale) snapshot without locking.
pub struct StatsRegistry {
    routes: RwLock<HashMap<String, Arc<RouteTable>>>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self { routes: RwLock::new(HashMap::new()) }
    }

    fn route(&self, route_id: &str) -> Result<Arc<RouteTable>> {
        self.routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(route_id)
            .cloned()
            .ok_or_else(|| GatewayError::RouteNotFound(route_id.to_string()))
    }

    /// Add an instance with zeroed stats. Rejects duplicate instance ids;
    /// use [`StatsRegistry::update`] for wholesale replacement.
    ///
    /// Topology mutations hold the registry write lock for their whole
    /// read-modify-write, so concurrent registrations cannot lose entries.
    /// Readers never take this lock; they load the swapped snapshot.
    pub fn register(&self, route_id: &str, instance: Instance) -> Result<()> {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        let table = routes
            .entry(route_id.to_string())
            .or_insert_with(|| Arc::new(RouteTable::new()))
            .clone();
        let current = table.entries.load_full();
        if current.iter().any(|e| e.instance.instance_id == instance.instance_id) {
            return Err(GatewayError::DuplicateInstance {
                route: route_id.to_string(),
                instance: instance.instance_id,
            });
        }
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(InstanceEntry::new(instance));
        table.entries.store(Arc::new(next));
        Ok(())
    }

    /// Replace a route's instance set wholesale (topology refresh).
    ///
    /// Stats survive for instance ids present in both the old and new set;
    /// new ids start zeroed, removed ids are dropped.
    pub fn update(&self, route_id: &str, instances: Vec<Instance>) {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        let table = routes
            .entry(route_id.to_string())
            .or_insert_with(|| Arc::new(RouteTable::new()))
            .clone();
        let current = table.entries.load_full();
        let next: Vec<Arc<InstanceEntry>> = instances
            .into_iter()
            .map(|instance| {
                match current.iter().find(|e| {
                    e.instance.instance_id == instance.instance_id
                        && *e.instance == instance
                }) {
                    Some(existing) => existing.clone(),
                    None => InstanceEntry::new(instance),
                }
            })
            .collect();
        table.entries.store(Arc::new(next));
    }

    /// Drop an instance and its stats.
    pub fn deregister(&self, route_id: &str, instance_id: &str) -> Result<()> {
        let routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        let table = routes
            .get(route_id)
            .cloned()
            .ok_or_else(|| GatewayError::RouteNotFound(route_id.to_string()))?;
        let current = table.entries.load_full();
        if !current.iter().any(|e| e.instance.instance_id == instance_id) {
            return Err(GatewayError::InstanceNotFound {
                route: route_id.to_string(),
                instance: instance_id.to_string(),
            });
        }
        let next: Vec<Arc<InstanceEntry>> = current
            .iter()
            .filter(|e| e.instance.instance_id != instance_id)
            .cloned()
            .collect();
        table.entries.store(Arc::new(next));
        Ok(())
    }

    pub fn record_start(&self, route_id: &str, instance_id: &str) -> Result<()> {
        self.entry(route_id, instance_id)?.stats.start_request();
        Ok(())
    }

    pub fn record_end(&self, route_id: &str, instance_id: &str, elapsed: Duration) -> Result<()> {
        self.entry(route_id, instance_id)?.stats.end_request(elapsed);
        Ok(())
    }

    /// Flip an instance's liveness (probe collaborator input).
    pub fn mark_alive(&self, route_id: &str, instance_id: &str, alive: bool) -> Result<()> {
        self.entry(route_id, instance_id)?.stats.set_alive(alive);
        Ok(())
    }

    pub fn entry(&self, route_id: &str, instance_id: &str) -> Result<Arc<InstanceEntry>> {
        self.route(route_id)?
            .find(instance_id)
            .ok_or_else(|| GatewayError::InstanceNotFound {
                route: route_id.to_string(),
                instance: instance_id.to_string(),
            })
    }

    /// Current instance set for a route, in declaration order.
    ///
    /// The snapshot may be stale relative to concurrent stat updates; that
    /// weak consistency is accepted by the choosers.
    pub fn snapshot(&self, route_id: &str) -> Result<Snapshot> {
        Ok(self.route(route_id)?.entries.load_full())
    }
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
