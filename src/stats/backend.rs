//! Backend trait for delivery counters.
//!
//! Senders report per-platform success and failure tallies into a
//! `CounterStore`. Counters only ever grow; there is no decrement.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::notification::Platform;

/// Errors that can occur during counter store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Backend is temporarily unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Success/failure tallies for one platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlatformCounters {
    pub success: u64,
    pub failure: u64,
}

impl PlatformCounters {
    pub fn total(&self) -> u64 {
        self.success + self.failure
    }
}

/// Point-in-time view of all platform counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub backend_type: String,
    pub platforms: HashMap<Platform, PlatformCounters>,
}

impl CounterSnapshot {
    /// Counters for a platform, zero if nothing was recorded
    pub fn platform(&self, platform: Platform) -> PlatformCounters {
        self.platforms.get(&platform).copied().unwrap_or_default()
    }

    pub fn total_success(&self) -> u64 {
        self.platforms.values().map(|c| c.success).sum()
    }

    pub fn total_failure(&self) -> u64 {
        self.platforms.values().map(|c| c.failure).sum()
    }
}

/// Durable per-platform delivery counters.
///
/// # Thread Safety
///
/// Implementations are shared by every dispatch worker and must apply
/// concurrent increments without losing updates.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Add `count` successful deliveries for a platform.
    async fn increment_success(&self, platform: Platform, count: u64) -> Result<(), StoreError>;

    /// Add `count` failed deliveries for a platform.
    async fn increment_failure(&self, platform: Platform, count: u64) -> Result<(), StoreError>;

    /// Read the current counters.
    async fn snapshot(&self) -> Result<CounterSnapshot, StoreError>;
}
