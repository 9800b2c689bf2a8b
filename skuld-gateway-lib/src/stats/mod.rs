pub mod guard;
pub mod reachability;
pub mod registry;

pub use guard::InFlightGuard;
pub use reachability::{DefaultReachability, ReachabilityStrategy};
pub use registry::{Instance, InstanceEntry, InstanceStats, Snapshot, StatsRegistry};
