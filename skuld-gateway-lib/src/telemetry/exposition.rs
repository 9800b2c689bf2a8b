use prometheus::{Encoder, TextEncoder};

use crate::error::{GatewayError, Result};

/// Render the metrics registry in the Prometheus text format.
///
/// Serving this over HTTP is the embedding layer's job; this core only
/// produces the payload.
pub fn encode_metrics(registry: &prometheus::Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| GatewayError::Telemetry(format!("Failed to encode metrics: {e}")))?;

    String::from_utf8(buffer)
        .map_err(|e| GatewayError::Telemetry(format!("Metrics output was not UTF-8: {e}")))
}
