use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::balance::{build_chooser, Chooser, RequestContext};
use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::events::{EventChannel, GatewayEvent, LimiterKind};
use crate::limit::{
    CounterStore, LimitedResult, QuotaLimiter, QuotaStrategy, RateLimiter, RateStrategy,
    StrategyStore,
};
use crate::stats::{
    DefaultReachability, InFlightGuard, Instance, ReachabilityStrategy, StatsRegistry,
};
use crate::telemetry::Metrics;

/// Outcome of one admission + selection pass.
pub enum Decision {
    /// A limiter denied the request; short-circuited before selection.
    Denied { kind: LimiterKind, result: LimitedResult },
    /// Admitted and routed. Dropping the guard records completion, so the
    /// in-flight count is released even when the request is cancelled.
    Routed {
        instance: Arc<Instance>,
        /// Informational limiter headers for the HTTP layer.
        headers: Vec<(String, String)>,
        guard: InFlightGuard,
    },
}

impl std::fmt::Debug for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Denied { kind, result } => f
                .debug_struct("Denied")
                .field("kind", kind)
                .field("result", result)
                .finish(),
            Decision::Routed { instance, headers, .. } => f
                .debug_struct("Routed")
                .field("instance", instance)
                .field("headers", headers)
                .finish_non_exhaustive(),
        }
    }
}

struct RoutePipeline {
    chooser: Box<dyn Chooser>,
    rate_default: Option<RateStrategy>,
    quota_default: Option<QuotaStrategy>,
}

/// Per-request traffic-shaping decisions: limiter gate, reachability
/// filter, instance selection.
///
/// Route pipelines (algorithm, limiter defaults) are resolved once at
/// construction and immutable afterwards; only the topology in the
/// [`StatsRegistry`] changes at runtime.
pub struct DecisionEngine {
    registry: Arc<StatsRegistry>,
    reachability: Arc<dyn ReachabilityStrategy>,
    routes: HashMap<String, RoutePipeline>,
    rate_limiter: RateLimiter,
    quota_limiter: QuotaLimiter,
    events: EventChannel,
    metrics: Option<Arc<Metrics>>,
}

impl DecisionEngine {
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CounterStore>,
        strategies: Arc<dyn StrategyStore>,
        events: EventChannel,
        metrics: Option<Arc<Metrics>>,
    ) -> Result<Self> {
        let registry = Arc::new(StatsRegistry::new());
        let prefix = config
            .limiter
            .as_ref()
            .map(|l| l.prefix.clone())
            .unwrap_or_else(|| "skuld".to_string());

        let mut routes = HashMap::new();
        for route in &config.routes {
            for instance in &route.instances {
                registry.register(
                    &route.id,
                    Instance {
                        service_id: instance.service.clone(),
                        instance_id: instance.id.clone(),
                        address: instance.address.clone(),
                        weight: instance.weight,
                    },
                )?;
                if let Some(m) = &metrics {
                    m.set_instance_alive(&route.id, &instance.service, &instance.id, true);
                }
            }
            routes.insert(
                route.id.clone(),
                RoutePipeline {
                    chooser: build_chooser(route.algorithm),
                    rate_default: route.rate.clone(),
                    quota_default: route.quota.clone(),
                },
            );
            info!(route = %route.id, algorithm = ?route.algorithm, instances = route.instances.len(), "route registered");
        }

        let rate_limiter = RateLimiter::new(
            store.clone(),
            strategies.clone(),
            prefix.clone(),
            events.clone(),
            metrics.clone(),
        );
        let quota_limiter =
            QuotaLimiter::new(store, strategies, prefix, events.clone(), metrics.clone());

        Ok(Self {
            registry,
            reachability: Arc::new(DefaultReachability {
                max_in_flight: config.reachability.max_in_flight,
            }),
            routes,
            rate_limiter,
            quota_limiter,
            events,
            metrics,
        })
    }

    /// Gate the request through the route's limiters, then pick a target
    /// instance among the reachable candidates.
    ///
    /// A limiter denial returns [`Decision::Denied`]; an empty reachable
    /// set is a distinct [`GatewayError::NoAvailableInstance`] failure.
    pub async fn admit(&self, route_id: &str, ctx: &RequestContext) -> Result<Decision> {
        let pipeline = self
            .routes
            .get(route_id)
            .ok_or_else(|| GatewayError::RouteNotFound(route_id.to_string()))?;

        let mut headers = Vec::new();

        if let Some(default) = &pipeline.rate_default {
            let result = self
                .rate_limiter
                .is_allowed(route_id, &ctx.limit_key, default)
                .await?;
            if !result.allowed {
                return Ok(Decision::Denied { kind: LimiterKind::Rate, result });
            }
            headers.extend(result.headers);
        }

        if let Some(default) = &pipeline.quota_default {
            let result = self
                .quota_limiter
                .is_allowed(route_id, &ctx.limit_key, &ctx.path, default)
                .await?;
            if !result.allowed {
                return Ok(Decision::Denied { kind: LimiterKind::Quota, result });
            }
            headers.extend(result.headers);
        }

        let snapshot = self.registry.snapshot(route_id)?;
        let candidates: Vec<_> = snapshot
            .iter()
            .filter(|e| self.reachability.is_alive(&e.stats))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(self.selection_failed(route_id));
        }

        let instance = pipeline
            .chooser
            .choose(&candidates, ctx)
            .map_err(|err| match err {
                GatewayError::NoAvailableInstance(_) => self.selection_failed(route_id),
                other => other,
            })?;

        let entry = candidates
            .iter()
            .find(|e| e.instance.instance_id == instance.instance_id)
            .cloned()
            .ok_or_else(|| GatewayError::InstanceNotFound {
                route: route_id.to_string(),
                instance: instance.instance_id.clone(),
            })?;

        let in_flight_metric = self.metrics.as_ref().map(|m| {
            (
                m.instance_in_flight.clone(),
                m.instance_attrs(route_id, &instance.service_id, &instance.instance_id),
            )
        });
        let guard = InFlightGuard::new(entry, in_flight_metric);

        if let Some(m) = &self.metrics {
            m.record_selection(route_id, &instance.instance_id);
        }
        self.events.publish(GatewayEvent::InstanceSelected {
            route: route_id.to_string(),
            instance: instance.instance_id.clone(),
        });

        Ok(Decision::Routed { instance, headers, guard })
    }

    fn selection_failed(&self, route_id: &str) -> GatewayError {
        if let Some(m) = &self.metrics {
            m.record_selection_failure(route_id);
        }
        self.events
            .publish(GatewayEvent::SelectionFailed { route: route_id.to_string() });
        GatewayError::NoAvailableInstance(route_id.to_string())
    }

    /// Topology input: add one instance to a known route.
    pub fn register_instance(&self, route_id: &str, instance: Instance) -> Result<()> {
        self.require_route(route_id)?;
        if let Some(m) = &self.metrics {
            m.set_instance_alive(route_id, &instance.service_id, &instance.instance_id, true);
        }
        self.registry.register(route_id, instance)
    }

    /// Topology input: replace a known route's instance set wholesale.
    /// Stats survive for unchanged instances.
    pub fn update_topology(&self, route_id: &str, instances: Vec<Instance>) -> Result<()> {
        self.require_route(route_id)?;
        if let Some(m) = &self.metrics {
            for instance in &instances {
                m.set_instance_alive(route_id, &instance.service_id, &instance.instance_id, true);
            }
        }
        self.registry.update(route_id, instances);
        Ok(())
    }

    pub fn deregister_instance(&self, route_id: &str, instance_id: &str) -> Result<()> {
        self.registry.deregister(route_id, instance_id)
    }

    /// Probe input: flip an instance's liveness.
    pub fn set_instance_health(&self, route_id: &str, instance_id: &str, alive: bool) -> Result<()> {
        self.registry.mark_alive(route_id, instance_id, alive)?;
        if let Some(m) = &self.metrics {
            let entry = self.registry.entry(route_id, instance_id)?;
            m.set_instance_alive(route_id, &entry.instance.service_id, instance_id, alive);
        }
        Ok(())
    }

    pub fn registry(&self) -> &Arc<StatsRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &EventChannel {
        &self.events
    }

    fn require_route(&self, route_id: &str) -> Result<()> {
        if self.routes.contains_key(route_id) {
            Ok(())
        } else {
            Err(GatewayError::RouteNotFound(route_id.to_string()))
        }
    }
}
