use std::sync::{Arc, Mutex};

use crate::error::{GatewayError, Result};
use crate::stats::{Instance, InstanceEntry};

use super::{Chooser, RequestContext};

struct WrrState {
    /// Instance ids the current weights correspond to, in declaration order.
    ids: Vec<String>,
    current: Vec<i64>,
}

/// Smooth weighted round robin (the nginx scheme).
///
/// Each pick adds every candidate's weight to its running score, selects the
/// highest score, then subtracts the total weight from the winner. Heavier
/// instances win proportionally more often without bursting.
///
/// The running scores are keyed to the candidate id list and reset whenever
/// the candidate set changes.
pub struct WeightedRoundRobin {
    state: Mutex<WrrState>,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self { state: Mutex::new(WrrState { ids: Vec::new(), current: Vec::new() }) }
    }
}

impl Default for WeightedRoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl Chooser for WeightedRoundRobin {
    fn choose(
        &self,
        candidates: &[Arc<InstanceEntry>],
        _ctx: &RequestContext,
    ) -> Result<Arc<Instance>> {
        if candidates.is_empty() {
            return Err(GatewayError::NoAvailableInstance(String::new()));
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let ids_match = state.ids.len() == candidates.len()
            && state
                .ids
                .iter()
                .zip(candidates)
                .all(|(id, entry)| *id == entry.instance.instance_id);
        if !ids_match {
            state.ids = candidates
                .iter()
                .map(|e| e.instance.instance_id.clone())
                .collect();
            state.current = vec![0; candidates.len()];
        }

        let mut total: i64 = 0;
        for (score, entry) in state.current.iter_mut().zip(candidates) {
            let weight = i64::from(entry.instance.weight.max(1));
            *score += weight;
            total += weight;
        }

        let mut best = 0;
        for i in 1..state.current.len() {
            if state.current[i] > state.current[best] {
                best = i;
            }
        }
        state.current[best] -= total;

        Ok(candidates[best].instance.clone())
    }
}
