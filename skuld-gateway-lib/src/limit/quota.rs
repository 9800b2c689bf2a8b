use std::sync::Arc;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::Utc;
use tracing::warn;

use crate::error::{GatewayError, Result};
use crate::events::{EventChannel, GatewayEvent, LimiterKind};
use crate::telemetry::Metrics;

use super::result::{headers, LimitedResult};
use super::store::CounterStore;
use super::strategy::QuotaStrategy;
use super::strategy_store::StrategyStore;

/// Distributed cycle-bounded quota limiter.
///
/// The current cycle is named by formatting "now" (UTC) with the strategy's
/// pattern; counters roll over naturally at the cycle boundary because the
/// bucket key changes. Fail-open semantics match [`super::RateLimiter`].
pub struct QuotaLimiter {
    store: Arc<dyn CounterStore>,
    strategies: Arc<dyn StrategyStore>,
    prefix: String,
    events: EventChannel,
    metrics: Option<Arc<Metrics>>,
}

impl QuotaLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        strategies: Arc<dyn StrategyStore>,
        prefix: impl Into<String>,
        events: EventChannel,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self { store, strategies, prefix: prefix.into(), events, metrics }
    }

    /// Evaluate admission for `key` on `route_id`. `path` is carried into
    /// the audit event emitted on every denial.
    pub async fn is_allowed(
        &self,
        route_id: &str,
        key: &str,
        path: &str,
        default: &QuotaStrategy,
    ) -> Result<LimitedResult> {
        let strategy = match self.strategies.load_quota(route_id, key).await {
            Ok(Some(strategy)) => strategy,
            Ok(None) => default.clone(),
            Err(err @ GatewayError::MalformedStrategy { .. }) => return Err(err),
            Err(err) => {
                warn!(route = route_id, %err, "quota strategy lookup failed, using default");
                default.clone()
            }
        };

        let Some(cycle) = cycle_label(&strategy.cycle_pattern) else {
            warn!(
                route = route_id,
                pattern = %strategy.cycle_pattern,
                "invalid quota cycle pattern, failing open"
            );
            let result = LimitedResult::indeterminate();
            // The unformatted pattern stands in for the cycle label.
            return Ok(if strategy.emit_headers {
                result.with_headers(&headers::QUOTA, strategy.capacity, &strategy.cycle_pattern, key)
            } else {
                result
            });
        };

        let bucket = format!("{}:quota:{}", self.prefix, cycle);
        let member = format!("{route_id}:{key}");

        let result = match self
            .store
            .incr_and_get(&bucket, &member, Duration::from_secs(strategy.retain_secs))
            .await
        {
            Ok(accumulated) => {
                let tokens_left = strategy.capacity as i64 - accumulated;
                if accumulated <= strategy.capacity as i64 {
                    LimitedResult::allowed(tokens_left)
                } else {
                    self.events.publish(GatewayEvent::QuotaExceeded {
                        route: route_id.to_string(),
                        key: key.to_string(),
                        path: path.to_string(),
                    });
                    LimitedResult::denied(tokens_left)
                }
            }
            Err(err) => {
                warn!(route = route_id, key, %err, "quota counter store unavailable, failing open");
                if let Some(m) = &self.metrics {
                    m.record_store_failure(LimiterKind::Quota, route_id);
                }
                self.events.publish(GatewayEvent::StoreFailure {
                    route: route_id.to_string(),
                    kind: LimiterKind::Quota,
                });
                LimitedResult::indeterminate()
            }
        };

        if let Some(m) = &self.metrics {
            m.record_limiter(LimiterKind::Quota, route_id, result.allowed);
        }
        self.events.publish(GatewayEvent::LimiterEvaluated {
            route: route_id.to_string(),
            kind: LimiterKind::Quota,
            allowed: result.allowed,
        });

        if strategy.emit_headers {
            Ok(result.with_headers(&headers::QUOTA, strategy.capacity, &cycle, key))
        } else {
            Ok(result)
        }
    }
}

/// Format "now" with the strategy's cycle pattern. `None` when the pattern
/// itself does not parse.
pub(crate) fn cycle_label(pattern: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    Some(Utc::now().format_with_items(items.into_iter()).to_string())
}
