//! In-memory counter store using DashMap.
//!
//! Counters live for the lifetime of the process and are lost on restart.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::notification::Platform;

use super::backend::{CounterSnapshot, CounterStore, PlatformCounters, StoreError};

#[derive(Debug, Default)]
struct AtomicCounters {
    success: AtomicU64,
    failure: AtomicU64,
}

/// In-memory counter store.
///
/// Each platform owns a pair of atomics updated in place by concurrent workers.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<Platform, AtomicCounters>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, platform: Platform, count: u64, pick: impl Fn(&AtomicCounters) -> &AtomicU64) {
        let entry = self.counters.entry(platform).or_default();
        pick(entry.value()).fetch_add(count, Ordering::Relaxed);
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment_success(&self, platform: Platform, count: u64) -> Result<(), StoreError> {
        self.add(platform, count, |c| &c.success);
        Ok(())
    }

    async fn increment_failure(&self, platform: Platform, count: u64) -> Result<(), StoreError> {
        self.add(platform, count, |c| &c.failure);
        Ok(())
    }

    async fn snapshot(&self) -> Result<CounterSnapshot, StoreError> {
        let platforms = self
            .counters
            .iter()
            .map(|entry| {
                let counters = PlatformCounters {
                    success: entry.success.load(Ordering::Relaxed),
                    failure: entry.failure.load(Ordering::Relaxed),
                };
                (*entry.key(), counters)
            })
            .collect();

        Ok(CounterSnapshot {
            backend_type: "memory".to_string(),
            platforms,
        })
    }
}
