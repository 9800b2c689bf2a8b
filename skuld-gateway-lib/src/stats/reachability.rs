use super::registry::InstanceStats;

/// Decides whether an instance is eligible to receive traffic.
///
/// Implementations are pure over the stats snapshot, so strategies can be
/// swapped without touching the choosers.
pub trait ReachabilityStrategy: Send + Sync {
    fn is_alive(&self, stats: &InstanceStats) -> bool;
}

/// Default policy: the instance's alive flag is set and, if a ceiling is
/// configured, its in-flight count is below it.
#[derive(Debug, Clone, Default)]
pub struct DefaultReachability {
    pub max_in_flight: Option<u64>,
}

impl ReachabilityStrategy for DefaultReachability {
    fn is_alive(&self, stats: &InstanceStats) -> bool {
        if !stats.is_alive() {
            return false;
        }
        match self.max_in_flight {
            Some(ceiling) => (stats.in_flight().max(0) as u64) < ceiling,
            None => true,
        }
    }
}
