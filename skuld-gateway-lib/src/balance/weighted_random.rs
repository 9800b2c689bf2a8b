use std::sync::Arc;

use rand::Rng;

use crate::error::{GatewayError, Result};
use crate::stats::{Instance, InstanceEntry};

use super::{Chooser, RequestContext};

/// Weight-proportional random pick: one uniform draw over the cumulative
/// weight table, mapped to a candidate by binary search.
pub struct WeightedRandom;

impl Chooser for WeightedRandom {
    fn choose(
        &self,
        candidates: &[Arc<InstanceEntry>],
        _ctx: &RequestContext,
    ) -> Result<Arc<Instance>> {
        if candidates.is_empty() {
            return Err(GatewayError::NoAvailableInstance(String::new()));
        }
        let mut cumulative = Vec::with_capacity(candidates.len());
        let mut total: u64 = 0;
        for entry in candidates {
            total += u64::from(entry.instance.weight.max(1));
            cumulative.push(total);
        }
        let draw = rand::thread_rng().gen_range(0..total);
        // First slot whose cumulative weight exceeds the draw.
        let i = cumulative.partition_point(|&c| c <= draw);
        Ok(candidates[i].instance.clone())
    }
}
