mod dispatch;
mod hash;
mod least;
mod random;
mod round_robin;
mod weighted_random;
mod weighted_round_robin;

use std::sync::Arc;

use crate::error::Result;
use crate::stats::{Instance, InstanceEntry};

pub use dispatch::{build_chooser, Algorithm};
pub use hash::{DestinationHash, SourceHash};
pub use least::{LeastConn, LeastTime};
pub use random::Random;
pub use round_robin::RoundRobin;
pub use weighted_random::WeightedRandom;
pub use weighted_round_robin::WeightedRoundRobin;

/// Request attributes the choosers and limiters may consult.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Source address or equivalent client identity (SourceHash input).
    pub source: Option<String>,
    /// Destination key, e.g. the upstream service name (DestinationHash input).
    pub destination: Option<String>,
    /// Request path, carried into audit events.
    pub path: String,
    /// Resolved limiting key (principal, IP, header value, ...).
    pub limit_key: String,
}

/// A selection algorithm over a route's reachable instances.
///
/// Candidates arrive already filtered for reachability, in declaration
/// order. An empty candidate list is a selection failure for the request,
/// never for the process.
pub trait Chooser: Send + Sync {
    fn choose(
        &self,
        candidates: &[Arc<InstanceEntry>],
        ctx: &RequestContext,
    ) -> Result<Arc<Instance>>;
}
