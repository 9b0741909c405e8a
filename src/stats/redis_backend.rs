//! Redis counter store.
//!
//! Counters are plain integer keys updated with `INCRBY`, so increments from
//! any number of workers or processes are applied atomically by Redis.
//!
//! Key layout: `{prefix}:{platform}:success` and `{prefix}:{platform}:error`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::notification::Platform;

use super::backend::{CounterSnapshot, CounterStore, PlatformCounters, StoreError};

/// Redis-backed counter store.
pub struct RedisCounterStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisCounterStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    fn success_key(&self, platform: Platform) -> String {
        success_key(&self.prefix, platform)
    }

    fn failure_key(&self, platform: Platform) -> String {
        failure_key(&self.prefix, platform)
    }

    async fn incr(&self, key: String, count: u64) -> Result<(), StoreError> {
        if count == 0 {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: i64 = conn.incr(&key, count).await?;
        tracing::trace!(key = %key, count = count, "Incremented delivery counter");
        Ok(())
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment_success(&self, platform: Platform, count: u64) -> Result<(), StoreError> {
        self.incr(self.success_key(platform), count).await
    }

    async fn increment_failure(&self, platform: Platform, count: u64) -> Result<(), StoreError> {
        self.incr(self.failure_key(platform), count).await
    }

    async fn snapshot(&self) -> Result<CounterSnapshot, StoreError> {
        let keys = snapshot_keys(&self.prefix);
        let mut conn = self.conn.clone();
        let values: Vec<Option<u64>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;
        Ok(snapshot_from_values(&values))
    }
}

fn success_key(prefix: &str, platform: Platform) -> String {
    format!("{}:{}:success", prefix, platform)
}

fn failure_key(prefix: &str, platform: Platform) -> String {
    format!("{}:{}:error", prefix, platform)
}

/// Keys read by `snapshot`, a success/failure pair per platform in `Platform::ALL` order
fn snapshot_keys(prefix: &str) -> Vec<String> {
    Platform::ALL
        .iter()
        .flat_map(|p| [success_key(prefix, *p), failure_key(prefix, *p)])
        .collect()
}

/// Map an `MGET` reply for `snapshot_keys` back onto platforms. Missing keys count as zero.
fn snapshot_from_values(values: &[Option<u64>]) -> CounterSnapshot {
    let platforms = Platform::ALL
        .iter()
        .enumerate()
        .map(|(i, platform)| {
            let counters = PlatformCounters {
                success: values.get(2 * i).copied().flatten().unwrap_or(0),
                failure: values.get(2 * i + 1).copied().flatten().unwrap_or(0),
            };
            (*platform, counters)
        })
        .collect();

    CounterSnapshot {
        backend_type: "redis".to_string(),
        platforms,
    }
}
