use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;

use crate::error::{GatewayError, Result};

use super::strategy::{QuotaStrategy, RateStrategy};

/// Per-route, per-key strategy documents, hot-updatable by an operator
/// without redeploying.
///
/// `Ok(None)` means no override exists; the caller falls back to its
/// statically configured default strategy. A malformed document is a
/// configuration error and is never silently defaulted.
#[async_trait]
pub trait StrategyStore: Send + Sync {
    async fn load_rate(&self, route_id: &str, key: &str) -> Result<Option<RateStrategy>>;
    async fn load_quota(&self, route_id: &str, key: &str) -> Result<Option<QuotaStrategy>>;
}

/// Strategy documents stored as JSON under `prefix:kind:routeId:limitKey`.
///
/// Lookups are cached with a bounded TTL so the hot path does not hit the
/// store on every evaluation.
pub struct RedisStrategyStore {
    conn: ConnectionManager,
    prefix: String,
    cache_ttl: Duration,
    rate_cache: Mutex<HashMap<String, (Instant, Option<RateStrategy>)>>,
    quota_cache: Mutex<HashMap<String, (Instant, Option<QuotaStrategy>)>>,
}

impl RedisStrategyStore {
    pub async fn connect(url: &str, prefix: impl Into<String>, cache_ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::with_connection(conn, prefix, cache_ttl))
    }

    pub fn with_connection(
        conn: ConnectionManager,
        prefix: impl Into<String>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
            cache_ttl,
            rate_cache: Mutex::new(HashMap::new()),
            quota_cache: Mutex::new(HashMap::new()),
        }
    }

    fn doc_key(&self, kind: &str, route_id: &str, key: &str) -> String {
        format!("{}:{}:{}:{}", self.prefix, kind, route_id, key)
    }

    async fn fetch<S: DeserializeOwned>(&self, doc_key: &str) -> Result<Option<S>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(doc_key).await?;
        match raw {
            None => Ok(None),
            Some(doc) => serde_json::from_str(&doc)
                .map(Some)
                .map_err(|source| GatewayError::MalformedStrategy {
                    key: doc_key.to_string(),
                    source,
                }),
        }
    }
}

fn cached<S: Clone>(
    cache: &Mutex<HashMap<String, (Instant, Option<S>)>>,
    doc_key: &str,
    ttl: Duration,
) -> Option<Option<S>> {
    let cache = cache.lock().unwrap_or_else(|e| e.into_inner());
    cache
        .get(doc_key)
        .filter(|(at, _)| at.elapsed() < ttl)
        .map(|(_, strategy)| strategy.clone())
}

fn remember<S: Clone>(
    cache: &Mutex<HashMap<String, (Instant, Option<S>)>>,
    doc_key: &str,
    strategy: Option<S>,
) {
    cache
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(doc_key.to_string(), (Instant::now(), strategy));
}

#[async_trait]
impl StrategyStore for RedisStrategyStore {
    async fn load_rate(&self, route_id: &str, key: &str) -> Result<Option<RateStrategy>> {
        let doc_key = self.doc_key("rate", route_id, key);
        if let Some(hit) = cached(&self.rate_cache, &doc_key, self.cache_ttl) {
            return Ok(hit);
        }
        let strategy = self.fetch::<RateStrategy>(&doc_key).await?;
        remember(&self.rate_cache, &doc_key, strategy.clone());
        Ok(strategy)
    }

    async fn load_quota(&self, route_id: &str, key: &str) -> Result<Option<QuotaStrategy>> {
        let doc_key = self.doc_key("quota", route_id, key);
        if let Some(hit) = cached(&self.quota_cache, &doc_key, self.cache_ttl) {
            return Ok(hit);
        }
        let strategy = self.fetch::<QuotaStrategy>(&doc_key).await?;
        remember(&self.quota_cache, &doc_key, strategy.clone());
        Ok(strategy)
    }
}

/// In-process strategy store for tests and single-node setups.
#[derive(Default)]
pub struct MemoryStrategyStore {
    rates: Mutex<HashMap<String, RateStrategy>>,
    quotas: Mutex<HashMap<String, QuotaStrategy>>,
}

impl MemoryStrategyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&self, route_id: &str, key: &str, strategy: RateStrategy) {
        self.rates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(format!("{route_id}:{key}"), strategy);
    }

    pub fn set_quota(&self, route_id: &str, key: &str, strategy: QuotaStrategy) {
        self.quotas
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(format!("{route_id}:{key}"), strategy);
    }
}

#[async_trait]
impl StrategyStore for MemoryStrategyStore {
    async fn load_rate(&self, route_id: &str, key: &str) -> Result<Option<RateStrategy>> {
        Ok(self
            .rates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&format!("{route_id}:{key}"))
            .cloned())
    }

    async fn load_quota(&self, route_id: &str, key: &str) -> Result<Option<QuotaStrategy>> {
        Ok(self
            .quotas
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&format!("{route_id}:{key}"))
            .cloned())
    }
}
