use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::error::{GatewayError, Result};
use crate::events::{EventChannel, GatewayEvent, LimiterKind};
use crate::telemetry::Metrics;

use super::result::{headers, LimitedResult};
use super::store::CounterStore;
use super::strategy::RateStrategy;
use super::strategy_store::StrategyStore;

/// Distributed fixed-window rate limiter.
///
/// The authoritative counter lives in the shared store; the decision is
/// "allowed if the post-increment count fits the window's budget". On store
/// failure the limiter fails open (allow, tokens_left = -1) so traffic is
/// never blocked on an infrastructure dependency, and the failure is
/// surfaced through a warning, a metric and a [`GatewayEvent::StoreFailure`].
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    strategies: Arc<dyn StrategyStore>,
    prefix: String,
    events: EventChannel,
    metrics: Option<Arc<Metrics>>,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        strategies: Arc<dyn StrategyStore>,
        prefix: impl Into<String>,
        events: EventChannel,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self { store, strategies, prefix: prefix.into(), events, metrics }
    }

    /// Evaluate admission for `key` on `route_id`.
    ///
    /// The strategy store may override `default` per route/key; a store
    /// error during that lookup falls back to `default` so limiting
    /// continues. Only a malformed strategy document is returned as an
    /// error.
    pub async fn is_allowed(
        &self,
        route_id: &str,
        key: &str,
        default: &RateStrategy,
    ) -> Result<LimitedResult> {
        let strategy = match self.strategies.load_rate(route_id, key).await {
            Ok(Some(strategy)) => strategy,
            Ok(None) => default.clone(),
            Err(err @ GatewayError::MalformedStrategy { .. }) => return Err(err),
            Err(err) => {
                warn!(route = route_id, %err, "rate strategy lookup failed, using default");
                default.clone()
            }
        };

        let window_secs = strategy.window_secs.max(1);
        let window_idx = now_secs() / window_secs;
        let bucket = format!("{}:rate:{}", self.prefix, window_idx);
        let member = format!("{route_id}:{key}");
        let limit = strategy.capacity + strategy.burst;

        let result = match self
            .store
            .incr_and_get(&bucket, &member, Duration::from_secs(window_secs * 2))
            .await
        {
            Ok(count) => {
                let tokens_left = limit as i64 - count;
                if count <= limit as i64 {
                    LimitedResult::allowed(tokens_left)
                } else {
                    LimitedResult::denied(tokens_left)
                }
            }
            Err(err) => {
                warn!(route = route_id, key, %err, "rate counter store unavailable, failing open");
                if let Some(m) = &self.metrics {
                    m.record_store_failure(LimiterKind::Rate, route_id);
                }
                self.events.publish(GatewayEvent::StoreFailure {
                    route: route_id.to_string(),
                    kind: LimiterKind::Rate,
                });
                LimitedResult::indeterminate()
            }
        };

        if let Some(m) = &self.metrics {
            m.record_limiter(LimiterKind::Rate, route_id, result.allowed);
        }
        self.events.publish(GatewayEvent::LimiterEvaluated {
            route: route_id.to_string(),
            kind: LimiterKind::Rate,
            allowed: result.allowed,
        });

        if strategy.emit_headers {
            let label = window_idx.to_string();
            Ok(result.with_headers(&headers::RATE, limit, &label, key))
        } else {
            Ok(result)
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
