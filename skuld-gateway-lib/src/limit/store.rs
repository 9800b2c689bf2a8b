use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;

use crate::error::Result;

/// Shared counter store for the limiters.
///
/// The store is shared across all gateway instances in a cluster, so every
/// mutation must be a single atomic operation; no client-side
/// read-modify-write across round trips.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment `member` inside `bucket` and return the
    /// post-increment value. `ttl` bounds the bucket's lifetime and is
    /// applied when the bucket is first touched.
    async fn incr_and_get(&self, bucket: &str, member: &str, ttl: Duration) -> Result<i64>;
}

/// Redis-backed counter store.
///
/// Increment and expiry run as one Lua script, keeping the operation a
/// single round trip and atomic across concurrent gateway instances.
pub struct RedisCounterStore {
    conn: ConnectionManager,
    incr_script: Script,
}

const INCR_LUA: &str = r#"
local v = redis.call('HINCRBY', KEYS[1], ARGV[1], 1)
if redis.call('TTL', KEYS[1]) < 0 then
  redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return v
"#;

impl RedisCounterStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::with_connection(conn))
    }

    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self { conn, incr_script: Script::new(INCR_LUA) }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_and_get(&self, bucket: &str, member: &str, ttl: Duration) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = self
            .incr_script
            .key(bucket)
            .arg(member)
            .arg(ttl.as_secs())
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }
}

/// In-process counter store for tests and single-node setups.
///
/// TTLs are ignored; buckets live for the store's lifetime.
#[derive(Default)]
pub struct MemoryCounterStore {
    buckets: Mutex<HashMap<String, HashMap<String, i64>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value without incrementing, for assertions.
    pub fn get(&self, bucket: &str, member: &str) -> Option<i64> {
        self.buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(bucket)
            .and_then(|b| b.get(member))
            .copied()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_and_get(&self, bucket: &str, member: &str, _ttl: Duration) -> Result<i64> {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let counter = buckets
            .entry(bucket.to_string())
            .or_default()
            .entry(member.to_string())
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
