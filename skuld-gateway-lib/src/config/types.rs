use serde::Deserialize;

use crate::balance::Algorithm;
use crate::limit::{QuotaStrategy, RateStrategy};

/// One backend instance of a route
#[derive(Debug, Deserialize, Clone)]
pub struct InstanceConfig {
    /// Instance identifier, unique within the route
    pub id: String,
    /// Logical service the instance belongs to
    pub service: String,
    /// Instance address (host:port format)
    pub address: String,
    /// Static weight for the weighted algorithms, >= 1
    /// Default: 1
    #[serde(default = "default_weight")]
    pub weight: u32,
}

/// One routed service
#[derive(Debug, Deserialize, Clone)]
pub struct RouteConfig {
    /// Route identifier
    pub id: String,
    /// Selection algorithm for this route
    /// Unknown identifiers fail at config load
    pub algorithm: Algorithm,
    /// Initial instance set; topology updates may replace it later
    pub instances: Vec<InstanceConfig>,
    /// Default rate-limit strategy; absent means no rate limiting.
    /// The strategy store may override it per limiting key.
    #[serde(default)]
    pub rate: Option<RateStrategy>,
    /// Default quota strategy; absent means no quota.
    #[serde(default)]
    pub quota: Option<QuotaStrategy>,
}

/// Shared-store configuration for the limiters
#[derive(Debug, Deserialize, Clone)]
pub struct LimiterConfig {
    /// Connection URL of the shared counter/strategy store
    /// Example: "redis://127.0.0.1:6379"
    pub store_url: String,
    /// Key prefix for counters and strategy documents
    /// Default: "skuld"
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// TTL in seconds for cached strategy documents
    /// Default: 30
    #[serde(default = "default_strategy_cache_secs")]
    pub strategy_cache_secs: u64,
}

/// Reachability policy
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReachabilityConfig {
    /// Instances at or above this many in-flight requests are treated as
    /// unreachable. Default: no ceiling
    #[serde(default)]
    pub max_in_flight: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

/// Event channel configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    /// Broadcast buffer size; lagging subscribers drop older events
    /// Default: 1024
    #[serde(default = "default_events_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: default_events_capacity() }
    }
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Routed services; at least one is required
    pub routes: Vec<RouteConfig>,
    /// Shared-store settings; optional, in-process counters are used when
    /// absent (single-node setups and tests)
    #[serde(default)]
    pub limiter: Option<LimiterConfig>,
    /// Reachability policy
    #[serde(default)]
    pub reachability: ReachabilityConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Event channel configuration
    #[serde(default)]
    pub events: EventsConfig,
}

fn default_weight() -> u32 {
    1
}

fn default_prefix() -> String {
    "skuld".to_string()
}

fn default_strategy_cache_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_events_capacity() -> usize {
    1024
}
