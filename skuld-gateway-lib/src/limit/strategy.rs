use serde::{Deserialize, Serialize};

/// Rate-limit strategy document: a continuously refilling fixed-window
/// budget per limiting key.
///
/// Fetched per evaluation (from the strategy store or route defaults) and
/// never mutated locally; the authoritative counter lives in the shared
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateStrategy {
    /// Requests admitted per window.
    pub capacity: u64,
    /// Window length in seconds.
    pub window_secs: u64,
    /// Extra requests tolerated above capacity within a window.
    #[serde(default)]
    pub burst: u64,
    /// Attach informational headers to results.
    #[serde(default = "default_true")]
    pub emit_headers: bool,
}

/// Quota strategy document: a cycle-bounded request budget per limiting
/// key, reset at each cycle boundary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuotaStrategy {
    /// Requests admitted per cycle.
    pub capacity: u64,
    /// strftime-style pattern that names the current cycle, e.g.
    /// "%Y-%m-%d" for a calendar-day bucket. Evaluated in UTC so all
    /// gateway instances agree on boundaries.
    pub cycle_pattern: String,
    /// TTL applied to cycle buckets in the shared store. Cycle length
    /// cannot be derived from an arbitrary pattern, so this bounds stale
    /// buckets explicitly.
    #[serde(default = "default_retain_secs")]
    pub retain_secs: u64,
    /// Attach informational headers to results.
    #[serde(default = "default_true")]
    pub emit_headers: bool,
}

fn default_true() -> bool {
    true
}

fn default_retain_secs() -> u64 {
    // Two days, covering any calendar-day pattern with slack.
    172_800
}
