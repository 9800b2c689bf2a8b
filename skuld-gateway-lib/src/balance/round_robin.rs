use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::stats::{Instance, InstanceEntry};

use super::{Chooser, RequestContext};

/// Per-route round robin: a monotonically increasing cursor taken modulo
/// the candidate count.
pub struct RoundRobin {
    index: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self { index: AtomicUsize::new(0) }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl Chooser for RoundRobin {
    fn choose(
        &self,
        candidates: &[Arc<InstanceEntry>],
        _ctx: &RequestContext,
    ) -> Result<Arc<Instance>> {
        if candidates.is_empty() {
            return Err(GatewayError::NoAvailableInstance(String::new()));
        }
        let i = self
            .index
            .fetch_add(1, Ordering::Relaxed)
            .checked_rem(candidates.len())
            .unwrap_or(0);
        Ok(candidates[i].instance.clone())
    }
}
