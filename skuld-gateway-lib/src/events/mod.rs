use tokio::sync::broadcast;
use tracing::debug;

/// Which limiter produced an event or decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterKind {
    Rate,
    Quota,
}

impl LimiterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterKind::Rate => "rate",
            LimiterKind::Quota => "quota",
        }
    }
}

/// Admission and selection events fanned out to metrics and audit consumers.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    LimiterEvaluated {
        route: String,
        kind: LimiterKind,
        allowed: bool,
    },
    /// Emitted on every quota denial, for audit.
    QuotaExceeded {
        route: String,
        key: String,
        path: String,
    },
    /// The shared store failed and the limiter failed open.
    StoreFailure {
        route: String,
        kind: LimiterKind,
    },
    InstanceSelected {
        route: String,
        instance: String,
    },
    SelectionFailed {
        route: String,
    },
}

/// Asynchronous fan-out of [`GatewayEvent`]s.
///
/// Explicitly constructed and passed to the components that publish;
/// there is no process-wide default bus. Publishing never blocks: slow
/// subscribers lag and drop events rather than stalling the hot path.
#[derive(Clone)]
pub struct EventChannel {
    tx: broadcast::Sender<GatewayEvent>,
}

impl EventChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: GatewayEvent) {
        // Err means no live subscribers, which is fine.
        if self.tx.send(event).is_err() {
            debug!("gateway event dropped: no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.tx.subscribe()
    }
}
