#![forbid(unsafe_code)]

pub mod balance;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod limit;
pub mod stats;
pub mod telemetry;

pub use balance::{Algorithm, Chooser, RequestContext};
pub use config::{load_from_path, Config, RouteConfig};
pub use engine::{Decision, DecisionEngine};
pub use error::{GatewayError, Result};
pub use events::{EventChannel, GatewayEvent, LimiterKind};
pub use limit::{LimitedResult, QuotaLimiter, QuotaStrategy, RateLimiter, RateStrategy};
pub use stats::{Instance, InstanceStats, StatsRegistry};
