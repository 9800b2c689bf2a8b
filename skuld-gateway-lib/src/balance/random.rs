use std::sync::Arc;

use rand::Rng;

use crate::error::{GatewayError, Result};
use crate::stats::{Instance, InstanceEntry};

use super::{Chooser, RequestContext};

/// Uniform random pick over the candidates.
pub struct Random;

impl Chooser for Random {
    fn choose(
        &self,
        candidates: &[Arc<InstanceEntry>],
        _ctx: &RequestContext,
    ) -> Result<Arc<Instance>> {
        if candidates.is_empty() {
            return Err(GatewayError::NoAvailableInstance(String::new()));
        }
        let i = rand::thread_rng().gen_range(0..candidates.len());
        Ok(candidates[i].instance.clone())
    }
}
