use serde::{Deserialize, Serialize};

use super::{
    Chooser, DestinationHash, LeastConn, LeastTime, Random, RoundRobin, SourceHash,
    WeightedRandom, WeightedRoundRobin,
};

/// The closed set of selection algorithms.
///
/// Deserialized straight from route configuration, so an unknown identifier
/// fails at config load, never at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    RoundRobin,
    Random,
    LeastConn,
    LeastTime,
    SourceHash,
    DestinationHash,
    WeightedRoundRobin,
    WeightedRandom,
    WeightedLeastConn,
    WeightedLeastTime,
}

/// Build the chooser for one route. Stateful algorithms (cursor, smooth
/// weights) get their own state per route; resolved once at engine
/// construction and immutable afterwards.
pub fn build_chooser(algorithm: Algorithm) -> Box<dyn Chooser> {
    match algorithm {
        Algorithm::RoundRobin => Box::new(RoundRobin::new()),
        Algorithm::Random => Box::new(Random),
        Algorithm::LeastConn => Box::new(LeastConn::new()),
        Algorithm::LeastTime => Box::new(LeastTime::new()),
        Algorithm::SourceHash => Box::new(SourceHash),
        Algorithm::DestinationHash => Box::new(DestinationHash),
        Algorithm::WeightedRoundRobin => Box::new(WeightedRoundRobin::new()),
        Algorithm::WeightedRandom => Box::new(WeightedRandom),
        Algorithm::WeightedLeastConn => Box::new(LeastConn::weighted()),
        Algorithm::WeightedLeastTime => Box::new(LeastTime::weighted()),
    }
}
