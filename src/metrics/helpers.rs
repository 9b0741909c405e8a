//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::notification::Platform;

use super::{
    DISPATCH_QUEUE_DEPTH, DISPATCH_REJECTED_TOTAL, DISPATCH_SUBMITTED_TOTAL,
    DISPATCH_WORKER_PANICS_TOTAL, PUSH_ATTEMPTS_TOTAL, PUSH_DELIVERIES_TOTAL, PUSH_RETRIES_TOTAL,
    PUSH_VALIDATION_FAILURES_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording delivery metrics
pub struct PushMetrics;

impl PushMetrics {
    /// Record successful recipient deliveries
    pub fn record_delivered(platform: Platform, count: u64) {
        if count > 0 {
            PUSH_DELIVERIES_TOTAL
                .with_label_values(&[platform.as_str(), "success"])
                .inc_by(count);
        }
    }

    /// Record failed recipient deliveries
    pub fn record_failed(platform: Platform, count: u64) {
        if count > 0 {
            PUSH_DELIVERIES_TOTAL
                .with_label_values(&[platform.as_str(), "failure"])
                .inc_by(count);
        }
    }

    pub fn record_attempt(platform: Platform) {
        PUSH_ATTEMPTS_TOTAL.with_label_values(&[platform.as_str()]).inc();
    }

    pub fn record_retry(platform: Platform) {
        PUSH_RETRIES_TOTAL.with_label_values(&[platform.as_str()]).inc();
    }

    pub fn record_validation_failure(platform: Platform) {
        PUSH_VALIDATION_FAILURES_TOTAL
            .with_label_values(&[platform.as_str()])
            .inc();
    }
}

/// Helper struct for recording dispatch queue metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Submission about to be handed to the queue
    pub fn record_enqueued() {
        DISPATCH_QUEUE_DEPTH.inc();
    }

    /// Request taken off the queue by a worker, or a submission that never got in
    pub fn record_dequeued() {
        DISPATCH_QUEUE_DEPTH.dec();
    }

    /// Request accepted onto the queue
    pub fn record_submitted() {
        DISPATCH_SUBMITTED_TOTAL.inc();
    }

    pub fn record_rejected() {
        DISPATCH_REJECTED_TOTAL.inc();
    }

    pub fn record_worker_panic() {
        DISPATCH_WORKER_PANICS_TOTAL.inc();
    }
}
