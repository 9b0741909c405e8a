//! Counter store factory

use std::sync::Arc;

use redis::aio::ConnectionManager;

use crate::config::StatsConfig;

use super::backend::{CounterStore, StoreError};
use super::memory_backend::MemoryCounterStore;
use super::redis_backend::RedisCounterStore;

/// Create a counter store based on configuration.
///
/// Returns the appropriate backend implementation based on the `backend` setting:
/// - `"redis"`: Returns a `RedisCounterStore` if a Redis connection is provided
/// - `"memory"` (default): Returns a `MemoryCounterStore`
///
/// # Example
///
/// ```rust,ignore
/// let client = redis::Client::open(settings.stats.redis_url.as_str())?;
/// let conn = ConnectionManager::new(client).await?;
/// let store = create_counter_store(&settings.stats, Some(conn));
/// ```
pub fn create_counter_store(
    settings: &StatsConfig,
    redis_conn: Option<ConnectionManager>,
) -> Arc<dyn CounterStore> {
    match settings.backend.as_str() {
        "redis" => {
            if let Some(conn) = redis_conn {
                tracing::info!(
                    backend = "redis",
                    prefix = %settings.redis_prefix,
                    "Creating Redis counter store"
                );
                Arc::new(RedisCounterStore::new(conn, settings.redis_prefix.clone()))
            } else {
                tracing::warn!(
                    "Redis counter store requested but no connection provided, falling back to memory"
                );
                Arc::new(MemoryCounterStore::new())
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory counter store");
            Arc::new(MemoryCounterStore::new())
        }
    }
}

/// Open the configured backend.
///
/// For `"redis"` a connection to `redis_url` is established first; the
/// memory backend needs no I/O.
pub async fn connect_counter_store(settings: &StatsConfig) -> Result<Arc<dyn CounterStore>, StoreError> {
    if settings.backend != "redis" {
        return Ok(create_counter_store(settings, None));
    }

    let client = redis::Client::open(settings.redis_url.as_str())?;
    let conn = ConnectionManager::new(client).await?;
    tracing::info!(url = %settings.redis_url, "Connected to Redis");
    Ok(create_counter_store(settings, Some(conn)))
}
