use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::stats::{Instance, InstanceEntry};

use super::{Chooser, RequestContext};

/// Picks the candidate with the fewest in-flight requests.
///
/// Ties go to the earlier-declared candidate. The weighted variant divides
/// the count by the instance's static weight, so a heavier instance absorbs
/// proportionally more load before being deprioritized.
pub struct LeastConn {
    weighted: bool,
}

impl LeastConn {
    pub fn new() -> Self {
        Self { weighted: false }
    }

    pub fn weighted() -> Self {
        Self { weighted: true }
    }
}

impl Chooser for LeastConn {
    fn choose(
        &self,
        candidates: &[Arc<InstanceEntry>],
        _ctx: &RequestContext,
    ) -> Result<Arc<Instance>> {
        pick_min(candidates, |entry| {
            let conns = entry.stats.in_flight().max(0) as f64;
            if self.weighted {
                conns / f64::from(entry.instance.weight.max(1))
            } else {
                conns
            }
        })
    }
}

/// Picks the candidate with the lowest mean response time.
///
/// An instance with no recorded requests scores zero, so fresh instances
/// are tried first. Ties and weighting behave as for [`LeastConn`].
pub struct LeastTime {
    weighted: bool,
}

impl LeastTime {
    pub fn new() -> Self {
        Self { weighted: false }
    }

    pub fn weighted() -> Self {
        Self { weighted: true }
    }
}

impl Chooser for LeastTime {
    fn choose(
        &self,
        candidates: &[Arc<InstanceEntry>],
        _ctx: &RequestContext,
    ) -> Result<Arc<Instance>> {
        pick_min(candidates, |entry| {
            let avg = entry.stats.avg_latency_ms();
            if self.weighted {
                avg / f64::from(entry.instance.weight.max(1))
            } else {
                avg
            }
        })
    }
}

fn pick_min<F>(candidates: &[Arc<InstanceEntry>], score: F) -> Result<Arc<Instance>>
where
    F: Fn(&InstanceEntry) -> f64,
{
    let mut best: Option<(&Arc<InstanceEntry>, f64)> = None;
    for entry in candidates {
        let s = score(entry);
        // Strict less-than keeps the first-declared candidate on ties.
        match best {
            Some((_, current)) if s >= current => {}
            _ => best = Some((entry, s)),
        }
    }
    best.map(|(entry, _)| entry.instance.clone())
        .ok_or_else(|| GatewayError::NoAvailableInstance(String::new()))
}
