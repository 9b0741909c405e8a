use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::metrics::{DispatchMetrics, PushMetrics};
use crate::notification::{NotificationRequest, Platform, ValidationError};
use crate::platform::{DeliveryMode, DeliveryReport, PlatformSender};

use super::dispatcher::DispatcherStats;

/// A queued request plus the completion handle of a synchronous submitter
pub(crate) struct Job {
    pub request: NotificationRequest,
    pub responder: Option<oneshot::Sender<DeliveryReport>>,
}

/// Routes requests to the sender registered for their platform
pub(crate) struct Router {
    senders: HashMap<Platform, PlatformSender>,
}

impl Router {
    pub fn new(senders: HashMap<Platform, PlatformSender>) -> Self {
        Self { senders }
    }

    pub fn is_enabled(&self, platform: Platform) -> bool {
        self.senders.contains_key(&platform)
    }

    async fn deliver(&self, request: &NotificationRequest, mode: DeliveryMode) -> DeliveryReport {
        match self.senders.get(&request.platform) {
            Some(sender) => sender.send(request, mode).await,
            None => {
                let error = ValidationError::PlatformDisabled(request.platform);
                tracing::error!(
                    request_id = %request.id,
                    error = %error,
                    "Request error"
                );
                PushMetrics::record_validation_failure(request.platform);
                DeliveryReport::rejected(error)
            }
        }
    }
}

/// Pull jobs until the queue is closed and drained.
///
/// Each job runs to completion, retries included, before the next is taken.
pub(crate) async fn run_worker(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<Job>>>,
    router: Arc<Router>,
    stats: Arc<DispatcherStats>,
) {
    tracing::debug!(worker_id, "Dispatch worker started");

    loop {
        // the lock is held only while waiting for the next job
        let job = { queue.lock().await.recv().await };
        let Some(Job { request, responder }) = job else {
            break;
        };
        DispatchMetrics::record_dequeued();

        let mode = if responder.is_some() {
            DeliveryMode::Sync
        } else {
            DeliveryMode::Async
        };

        match AssertUnwindSafe(router.deliver(&request, mode))
            .catch_unwind()
            .await
        {
            Ok(report) => {
                stats.completed.fetch_add(1, Ordering::Relaxed);
                if report.rejected.is_some() {
                    stats.validation_failures.fetch_add(1, Ordering::Relaxed);
                } else if report.had_failure {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                }
                if let Some(responder) = responder {
                    // the submitter may have stopped waiting
                    let _ = responder.send(report);
                }
            }
            Err(_) => {
                // dropping the responder tells a waiting submitter the delivery was lost
                stats.panics.fetch_add(1, Ordering::Relaxed);
                DispatchMetrics::record_worker_panic();
                tracing::error!(
                    worker_id,
                    request_id = %request.id,
                    platform = %request.platform,
                    "Delivery panicked, worker continues"
                );
            }
        }
    }

    tracing::debug!(worker_id, "Dispatch worker stopped");
}
