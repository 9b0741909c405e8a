//! Per-platform delivery counters.
//!
//! # Backend Architecture
//!
//! - `MemoryCounterStore`: atomics in a DashMap (default)
//! - `RedisCounterStore`: `INCRBY` counters shared across processes
//!
//! Use `create_counter_store()` to pick a backend from configuration.

mod backend;
mod factory;
mod memory_backend;
mod redis_backend;

pub use backend::{CounterSnapshot, CounterStore, PlatformCounters, StoreError};
pub use factory::{connect_counter_store, create_counter_store};
pub use memory_backend::MemoryCounterStore;
pub use redis_backend::RedisCounterStore;
