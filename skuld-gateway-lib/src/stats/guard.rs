use std::sync::Arc;
use std::time::Instant;

use opentelemetry::metrics::UpDownCounter;
use opentelemetry::KeyValue;

use super::registry::InstanceEntry;

/// Guard that records request completion when dropped.
///
/// Created after a chooser picks an instance: increments the in-flight
/// count on construction and records the end (decrement + latency) on drop.
/// Dropping on cancellation or panic still releases the slot, so the
/// in-flight counter cannot leak.
pub struct InFlightGuard {
    entry: Arc<InstanceEntry>,
    started: Instant,
    in_flight_metric: Option<(UpDownCounter<i64>, Vec<KeyValue>)>,
}

impl InFlightGuard {
    pub fn new(
        entry: Arc<InstanceEntry>,
        in_flight_metric: Option<(UpDownCounter<i64>, Vec<KeyValue>)>,
    ) -> Self {
        entry.stats.start_request();
        if let Some((counter, attrs)) = &in_flight_metric {
            counter.add(1, attrs);
        }
        Self { entry, started: Instant::now(), in_flight_metric }
    }

    pub fn instance(&self) -> &Arc<super::registry::Instance> {
        &self.entry.instance
    }

    /// Time since the request was handed to the instance.
    pub fn elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.entry.stats.end_request(self.started.elapsed());
        if let Some((counter, attrs)) = &self.in_flight_metric {
            counter.add(-1, attrs);
        }
    }
}
