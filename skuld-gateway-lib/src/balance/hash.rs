use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use ahash::RandomState;

use crate::error::{GatewayError, Result};
use crate::stats::{Instance, InstanceEntry};

use super::{Chooser, RequestContext};

// Fixed seeds: identical keys must land on the same instance across
// restarts, not just within one process.
const SEEDS: (u64, u64, u64, u64) = (
    0x7368_6170_6572_5f31,
    0x7368_6170_6572_5f32,
    0x7368_6170_6572_5f33,
    0x7368_6170_6572_5f34,
);

fn hash_key<K: Hash>(key: K) -> u64 {
    let state = RandomState::with_seeds(SEEDS.0, SEEDS.1, SEEDS.2, SEEDS.3);
    let mut hasher = state.build_hasher();
    key.hash(&mut hasher);
    hasher.finish()
}

fn pick_by_hash(candidates: &[Arc<InstanceEntry>], key: &str) -> Result<Arc<Instance>> {
    if candidates.is_empty() {
        return Err(GatewayError::NoAvailableInstance(String::new()));
    }
    let i = (hash_key(key) % candidates.len() as u64) as usize;
    Ok(candidates[i].instance.clone())
}

/// Maps the request's source identity onto a candidate index.
///
/// Identical sources land on the same instance for as long as the
/// candidate set is unchanged; no consistency is guaranteed across
/// topology changes.
pub struct SourceHash;

impl Chooser for SourceHash {
    fn choose(
        &self,
        candidates: &[Arc<InstanceEntry>],
        ctx: &RequestContext,
    ) -> Result<Arc<Instance>> {
        pick_by_hash(candidates, ctx.source.as_deref().unwrap_or_default())
    }
}

/// Like [`SourceHash`], keyed on the request's destination key.
pub struct DestinationHash;

impl Chooser for DestinationHash {
    fn choose(
        &self,
        candidates: &[Arc<InstanceEntry>],
        ctx: &RequestContext,
    ) -> Result<Arc<Instance>> {
        pick_by_hash(candidates, ctx.destination.as_deref().unwrap_or_default())
    }
}
