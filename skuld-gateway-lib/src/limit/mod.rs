mod quota;
mod rate;
mod result;
mod store;
mod strategy;
mod strategy_store;

pub use quota::QuotaLimiter;
pub(crate) use quota::cycle_label;
pub use rate::RateLimiter;
pub use result::{headers, LimitedResult};
pub use store::{CounterStore, MemoryCounterStore, RedisCounterStore};
pub use strategy::{QuotaStrategy, RateStrategy};
pub use strategy_store::{MemoryStrategyStore, RedisStrategyStore, StrategyStore};
