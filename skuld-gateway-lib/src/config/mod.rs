mod loader;
mod types;
mod validator;

pub use loader::load_from_path;
pub use types::{
    Config, EventsConfig, InstanceConfig, LimiterConfig, LoggingConfig, ReachabilityConfig,
    RouteConfig,
};
pub use validator::validate;
