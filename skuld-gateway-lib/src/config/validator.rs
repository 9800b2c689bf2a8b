use std::collections::HashSet;

use crate::config::types::Config;
use crate::limit::cycle_label;

/// Eager validation: anything wrong here is a startup error, never a
/// request-time surprise.
pub fn validate(config: &Config) -> Result<(), String> {
    if config.routes.is_empty() {
        return Err("at least one route is required".into());
    }

    let mut route_ids = HashSet::new();
    for route in &config.routes {
        if route.id.trim().is_empty() {
            return Err("route id cannot be empty".into());
        }
        if !route_ids.insert(route.id.as_str()) {
            return Err(format!("duplicate route id: {}", route.id));
        }
        if route.instances.is_empty() {
            return Err(format!("route {} has no instances", route.id));
        }

        let mut instance_ids = HashSet::new();
        for instance in &route.instances {
            if instance.address.trim().is_empty() {
                return Err(format!("route {}: instance address cannot be empty", route.id));
            }
            if instance.weight == 0 {
                return Err(format!(
                    "route {}: instance {} weight must be >= 1",
                    route.id, instance.id
                ));
            }
            if !instance_ids.insert(instance.id.as_str()) {
                return Err(format!(
                    "route {}: duplicate instance id: {}",
                    route.id, instance.id
                ));
            }
        }

        if let Some(rate) = &route.rate {
            if rate.capacity == 0 {
                return Err(format!("route {}: rate capacity must be > 0", route.id));
            }
            if rate.window_secs == 0 {
                return Err(format!("route {}: rate window_secs must be > 0", route.id));
            }
        }

        if let Some(quota) = &route.quota {
            if quota.capacity == 0 {
                return Err(format!("route {}: quota capacity must be > 0", route.id));
            }
            if cycle_label(&quota.cycle_pattern).is_none() {
                return Err(format!(
                    "route {}: invalid quota cycle pattern: {}",
                    route.id, quota.cycle_pattern
                ));
            }
        }
    }

    if let Some(limiter) = &config.limiter {
        if limiter.store_url.trim().is_empty() {
            return Err("limiter store_url cannot be empty".into());
        }
        if limiter.prefix.trim().is_empty() {
            return Err("limiter prefix cannot be empty".into());
        }
    }

    Ok(())
}
