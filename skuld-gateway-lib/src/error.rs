use thiserror::Error;

/// Errors that can occur in the decision engine
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Route not registered: {0}")]
    RouteNotFound(String),

    #[error("Instance not registered: {route}/{instance}")]
    InstanceNotFound { route: String, instance: String },

    #[error("Instance already registered: {route}/{instance}")]
    DuplicateInstance { route: String, instance: String },

    #[error("No available instance for route: {0}")]
    NoAvailableInstance(String),

    #[error("Counter store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Malformed strategy document at {key}: {source}")]
    MalformedStrategy {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, GatewayError>;
