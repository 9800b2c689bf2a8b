pub mod exposition;
pub mod metrics;
pub mod tracing;

pub use exposition::encode_metrics;
pub use metrics::{init_metrics, Metrics};
pub use tracing::init_tracing;
