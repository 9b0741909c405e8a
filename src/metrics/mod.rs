//! Prometheus metrics for the dispatch engine.
//!
//! - Delivery metrics (per platform and outcome, attempts, retries)
//! - Validation failures
//! - Dispatch queue metrics (depth, rejected submissions)

mod helpers;

pub use helpers::{encode_metrics, DispatchMetrics, PushMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "push";

lazy_static! {
    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Per-recipient delivery results by platform and outcome
    pub static ref PUSH_DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Per-recipient delivery results",
        &["platform", "outcome"]
    ).unwrap();

    /// Delivery attempts (one pass over a request's recipients)
    pub static ref PUSH_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_attempts_total", METRIC_PREFIX),
        "Delivery attempts made",
        &["platform"]
    ).unwrap();

    /// Attempts that were followed by a whole-batch retry
    pub static ref PUSH_RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_retries_total", METRIC_PREFIX),
        "Whole-batch retries triggered by failed recipients",
        &["platform"]
    ).unwrap();

    /// Requests rejected by validation
    pub static ref PUSH_VALIDATION_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_validation_failures_total", METRIC_PREFIX),
        "Requests rejected before any delivery attempt",
        &["platform"]
    ).unwrap();

    // ============================================================================
    // Dispatch Queue Metrics
    // ============================================================================

    /// Requests waiting for a worker. Under the block policy this includes
    /// producers still waiting for a slot, so it can exceed the queue capacity.
    pub static ref DISPATCH_QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_dispatch_queue_depth", METRIC_PREFIX),
        "Requests waiting in or for the dispatch queue"
    ).unwrap();

    /// Requests accepted onto the queue
    pub static ref DISPATCH_SUBMITTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_dispatch_submitted_total", METRIC_PREFIX),
        "Requests accepted onto the dispatch queue"
    ).unwrap();

    /// Submissions refused because the queue was full or closed
    pub static ref DISPATCH_REJECTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_dispatch_rejected_total", METRIC_PREFIX),
        "Submissions refused by the dispatch queue"
    ).unwrap();

    /// Worker panics caught while delivering a request
    pub static ref DISPATCH_WORKER_PANICS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_dispatch_worker_panics_total", METRIC_PREFIX),
        "Panics caught inside dispatch workers"
    ).unwrap();
}
