/// Transport-independent header names attached to limiter results.
///
/// Each limiter kind carries its own name set, so a route running both a
/// rate and a quota limiter never emits colliding names on one decision.
/// The HTTP layer decides whether and how to surface them; this core only
/// produces string key/value pairs.
pub mod headers {
    pub struct Names {
        pub capacity: &'static str,
        pub remaining: &'static str,
        /// Window index for rate, cycle label for quota.
        pub window: &'static str,
        pub key: &'static str,
    }

    pub const RATE: Names = Names {
        capacity: "x-rate-limit-capacity",
        remaining: "x-rate-limit-remaining",
        window: "x-rate-limit-window",
        key: "x-rate-limit-key",
    };

    pub const QUOTA: Names = Names {
        capacity: "x-quota-limit-capacity",
        remaining: "x-quota-limit-remaining",
        window: "x-quota-limit-cycle",
        key: "x-quota-limit-key",
    };
}

/// Outcome of one limiter evaluation. Produced fresh per call, immutable,
/// consumed once by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitedResult {
    pub allowed: bool,
    /// Remaining budget after this request. May go negative once the limit
    /// is exceeded (callers clamp for display); -1 when indeterminate
    /// because the shared store failed.
    pub tokens_left: i64,
    pub headers: Vec<(String, String)>,
}

impl LimitedResult {
    pub fn allowed(tokens_left: i64) -> Self {
        Self { allowed: true, tokens_left, headers: Vec::new() }
    }

    pub fn denied(tokens_left: i64) -> Self {
        Self { allowed: false, tokens_left, headers: Vec::new() }
    }

    /// Fail-open result used when the shared store is unavailable.
    pub fn indeterminate() -> Self {
        Self { allowed: true, tokens_left: -1, headers: Vec::new() }
    }

    pub fn with_headers(
        mut self,
        names: &headers::Names,
        capacity: u64,
        window_label: &str,
        key: &str,
    ) -> Self {
        self.headers = vec![
            (names.capacity.to_string(), capacity.to_string()),
            // Headers are a display surface: clamp the raw balance at zero.
            (names.remaining.to_string(), self.tokens_left.max(0).to_string()),
            (names.window.to_string(), window_label.to_string()),
            (names.key.to_string(), key.to_string()),
        ];
        self
    }
}
