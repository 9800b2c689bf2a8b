use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Meter, UpDownCounter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

use crate::events::LimiterKind;

pub mod labels {
    pub const ROUTE: &str = "route";
    pub const SERVICE: &str = "service";
    pub const INSTANCE: &str = "instance";
    pub const KIND: &str = "kind";
}

#[derive(Clone)]
pub struct Metrics {
    // Limiter metrics, labeled by route and kind (rate|quota)
    pub limiter_evaluated_total: Counter<u64>,
    pub limiter_hit_total: Counter<u64>,
    pub limiter_store_failures_total: Counter<u64>,

    // Selection metrics
    pub selections_total: Counter<u64>,
    pub selection_failures_total: Counter<u64>,

    // Per-instance state, labeled by route/service/instance
    pub instance_in_flight: UpDownCounter<i64>,
    pub instance_alive: Gauge<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            limiter_evaluated_total: meter
                .u64_counter("skuld_limiter_evaluated_total")
                .with_description("Total limiter evaluations. kind=rate|quota")
                .build(),
            limiter_hit_total: meter
                .u64_counter("skuld_limiter_hit_total")
                .with_description("Total limiter denials. kind=rate|quota")
                .build(),
            limiter_store_failures_total: meter
                .u64_counter("skuld_limiter_store_failures_total")
                .with_description("Shared-store failures observed by the limiters (fail-open)")
                .build(),

            selections_total: meter
                .u64_counter("skuld_selections_total")
                .with_description("Total instance selections")
                .build(),
            selection_failures_total: meter
                .u64_counter("skuld_selection_failures_total")
                .with_description("Selections that found no reachable instance")
                .build(),

            instance_in_flight: meter
                .i64_up_down_counter("skuld_instance_in_flight")
                .with_description("In-flight requests per instance")
                .build(),
            instance_alive: meter
                .u64_gauge("skuld_instance_alive")
                .with_description("Instance liveness (1 alive, 0 dead)")
                .build(),
        }
    }

    pub fn record_limiter(&self, kind: LimiterKind, route: &str, allowed: bool) {
        let attrs = [
            KeyValue::new(labels::KIND, kind.as_str()),
            KeyValue::new(labels::ROUTE, route.to_string()),
        ];
        self.limiter_evaluated_total.add(1, &attrs);
        if !allowed {
            self.limiter_hit_total.add(1, &attrs);
        }
    }

    pub fn record_store_failure(&self, kind: LimiterKind, route: &str) {
        self.limiter_store_failures_total.add(
            1,
            &[
                KeyValue::new(labels::KIND, kind.as_str()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }

    pub fn record_selection(&self, route: &str, instance: &str) {
        self.selections_total.add(
            1,
            &[
                KeyValue::new(labels::ROUTE, route.to_string()),
                KeyValue::new(labels::INSTANCE, instance.to_string()),
            ],
        );
    }

    pub fn record_selection_failure(&self, route: &str) {
        self.selection_failures_total
            .add(1, &[KeyValue::new(labels::ROUTE, route.to_string())]);
    }

    pub fn set_instance_alive(&self, route: &str, service: &str, instance: &str, alive: bool) {
        self.instance_alive.record(
            u64::from(alive),
            &[
                KeyValue::new(labels::ROUTE, route.to_string()),
                KeyValue::new(labels::SERVICE, service.to_string()),
                KeyValue::new(labels::INSTANCE, instance.to_string()),
            ],
        );
    }

    pub fn instance_attrs(&self, route: &str, service: &str, instance: &str) -> Vec<KeyValue> {
        vec![
            KeyValue::new(labels::ROUTE, route.to_string()),
            KeyValue::new(labels::SERVICE, service.to_string()),
            KeyValue::new(labels::INSTANCE, instance.to_string()),
        ]
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("skuld-gateway");
    let metrics = Arc::new(Metrics::new(meter));

    Ok((metrics, registry))
}
