use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{DispatchConfig, PlatformConfig, QueueFullPolicy, Settings};
use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;
use crate::notification::{LogEntry, NotificationRequest, Platform};
use crate::platform::{DeliveryMode, DeliveryReport, PlatformClient, PlatformSender};
use crate::stats::{CounterStore, MemoryCounterStore};

use super::worker::{run_worker, Job, Router};

/// Statistics for the dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Requests accepted onto the queue
    pub submitted: AtomicU64,
    /// Submissions refused (queue full or closed)
    pub rejected: AtomicU64,
    /// Requests a worker finished, rejected ones included
    pub completed: AtomicU64,
    /// Completed requests whose final attempt still had a failed recipient
    pub failed: AtomicU64,
    /// Requests refused by validation or routing
    pub validation_failures: AtomicU64,
    /// Deliveries lost to a panic inside a worker
    pub panics: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DispatcherStatsSnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
    pub validation_failures: u64,
    pub panics: u64,
}

/// Result of a single submission
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Queued; delivery happens in the background
    Accepted,
    /// Delivered; carries the final outcome
    Completed(DeliveryReport),
}

/// Result of a batch submission
#[derive(Debug, Clone, PartialEq)]
pub enum BatchSubmission {
    /// Number of requests queued
    Accepted(usize),
    /// Reports of every request, in submission order
    Completed(BatchReport),
    /// A submission was refused after earlier ones were queued.
    ///
    /// The first `accepted` requests are delivered; the rest were never queued.
    /// In sync mode `report` holds the outcomes of the accepted ones.
    Partial {
        accepted: usize,
        report: BatchReport,
        error: DispatchError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub reports: Vec<DeliveryReport>,
}

impl BatchReport {
    /// Whether any request in the batch ended with a failure
    pub fn had_failure(&self) -> bool {
        self.reports.iter().any(|r| r.had_failure)
    }

    /// Log entries of all requests, concatenated in submission order
    pub fn log(&self) -> Vec<LogEntry> {
        self.reports.iter().flat_map(|r| r.log.iter().cloned()).collect()
    }
}

/// Builder for [`Dispatcher`]
pub struct DispatcherBuilder {
    config: DispatchConfig,
    store: Option<Arc<dyn CounterStore>>,
    platforms: Vec<(Platform, PlatformConfig, Arc<dyn PlatformClient>)>,
}

impl DispatcherBuilder {
    fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            store: None,
            platforms: Vec::new(),
        }
    }

    /// Counter store shared by every platform; defaults to in-memory counters
    pub fn store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register the client for a platform. Later registrations replace earlier ones.
    pub fn platform(
        mut self,
        platform: Platform,
        config: PlatformConfig,
        client: Arc<dyn PlatformClient>,
    ) -> Self {
        self.platforms.retain(|(p, _, _)| *p != platform);
        self.platforms.push((platform, config, client));
        self
    }

    /// Spawn the worker pool. Must be called inside a tokio runtime.
    pub fn build(self) -> Dispatcher {
        let store: Arc<dyn CounterStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryCounterStore::new()),
        };

        let senders: HashMap<Platform, PlatformSender> = self
            .platforms
            .into_iter()
            .map(|(platform, config, client)| {
                let sender = PlatformSender::new(platform, config, client, store.clone());
                (platform, sender)
            })
            .collect();
        let enabled: Vec<&str> = senders.keys().map(|p| p.as_str()).collect();

        let workers = self.config.workers.max(1);
        let capacity = self.config.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel::<Job>(capacity);
        let queue = Arc::new(Mutex::new(rx));

        tracing::info!(
            workers,
            queue_capacity = capacity,
            policy = ?self.config.queue_full_policy,
            platforms = ?enabled,
            "Starting dispatcher"
        );

        let router = Arc::new(Router::new(senders));
        let stats = Arc::new(DispatcherStats::default());
        let handles = (0..workers)
            .map(|id| tokio::spawn(run_worker(id, queue.clone(), router.clone(), stats.clone())))
            .collect();

        Dispatcher {
            tx: RwLock::new(Some(tx)),
            workers: Mutex::new(handles),
            router,
            stats,
            policy: self.config.queue_full_policy,
            shutdown_timeout: Duration::from_secs(self.config.shutdown_timeout_seconds),
        }
    }
}

/// Bounded queue in front of a fixed pool of delivery workers.
///
/// Submissions never perform network I/O themselves. A synchronous submission
/// waits for its own request only; requests are otherwise unordered.
pub struct Dispatcher {
    tx: RwLock<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    router: Arc<Router>,
    stats: Arc<DispatcherStats>,
    policy: QueueFullPolicy,
    shutdown_timeout: Duration,
}

impl Dispatcher {
    pub fn builder(config: DispatchConfig) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    /// Build a dispatcher from loaded settings.
    ///
    /// Every enabled platform needs a client in `clients`; clients for
    /// disabled platforms are ignored.
    pub fn from_settings(
        settings: &Settings,
        store: Arc<dyn CounterStore>,
        clients: HashMap<Platform, Arc<dyn PlatformClient>>,
    ) -> crate::error::Result<Self> {
        settings.validate()?;

        let mut builder = Self::builder(settings.dispatch.clone()).store(store);
        for platform in Platform::ALL {
            let platform_config = settings.platform(platform);
            if !platform_config.enabled && !(platform == Platform::Ios && platform_config.voip_enabled) {
                continue;
            }
            let client = clients.get(&platform).cloned().ok_or_else(|| {
                config::ConfigError::Message(format!(
                    "platform {} is enabled but has no client",
                    platform
                ))
            })?;
            builder = builder.platform(platform, platform_config.clone(), client);
        }

        Ok(builder.build())
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether a sender is registered for the platform
    pub fn is_enabled(&self, platform: Platform) -> bool {
        self.router.is_enabled(platform)
    }

    /// Submit one request.
    ///
    /// Async mode returns once the request is queued. Sync mode waits for the
    /// final delivery outcome, retries included.
    #[tracing::instrument(
        name = "dispatcher.submit",
        skip(self, request, mode),
        fields(request_id = %request.id, platform = %request.platform, sync = mode.is_sync())
    )]
    pub async fn submit(
        &self,
        request: NotificationRequest,
        mode: DeliveryMode,
    ) -> Result<Submission, DispatchError> {
        match mode {
            DeliveryMode::Async => {
                self.push(request, None).await?;
                Ok(Submission::Accepted)
            }
            DeliveryMode::Sync => {
                let (tx, rx) = oneshot::channel();
                self.push(request, Some(tx)).await?;
                let report = rx.await.map_err(|_| DispatchError::Interrupted)?;
                Ok(Submission::Completed(report))
            }
        }
    }

    /// Queue a request without waiting for delivery
    pub async fn enqueue(&self, request: NotificationRequest) -> Result<(), DispatchError> {
        self.submit(request, DeliveryMode::Async).await.map(|_| ())
    }

    /// Queue a request and wait for its delivery report
    pub async fn deliver(&self, request: NotificationRequest) -> Result<DeliveryReport, DispatchError> {
        match self.submit(request, DeliveryMode::Sync).await? {
            Submission::Completed(report) => Ok(report),
            Submission::Accepted => Err(DispatchError::Interrupted),
        }
    }

    /// Submit several requests at once.
    ///
    /// Stops at the first refused submission. If nothing was queued the error
    /// is returned as is; otherwise the result is `BatchSubmission::Partial`,
    /// which waits for the queued requests in sync mode.
    #[tracing::instrument(
        name = "dispatcher.submit_batch",
        skip(self, requests, mode),
        fields(count = requests.len(), sync = mode.is_sync())
    )]
    pub async fn submit_batch(
        &self,
        requests: Vec<NotificationRequest>,
        mode: DeliveryMode,
    ) -> Result<BatchSubmission, DispatchError> {
        let mut accepted = 0;
        let mut pending = Vec::new();
        let mut refused = None;

        for request in requests {
            let (responder, receiver) = if mode.is_sync() {
                let (tx, rx) = oneshot::channel();
                (Some(tx), Some(rx))
            } else {
                (None, None)
            };

            match self.push(request, responder).await {
                Ok(()) => {
                    accepted += 1;
                    pending.extend(receiver);
                }
                Err(e) => {
                    refused = Some(e);
                    break;
                }
            }
        }

        let reports = join_all(pending)
            .await
            .into_iter()
            .map(|r| r.map_err(|_| DispatchError::Interrupted))
            .collect::<Result<Vec<_>, _>>()?;
        let report = BatchReport { reports };

        match refused {
            None if mode.is_sync() => Ok(BatchSubmission::Completed(report)),
            None => Ok(BatchSubmission::Accepted(accepted)),
            Some(error) if accepted == 0 => Err(error),
            Some(error) => {
                tracing::warn!(accepted, error = %error, "Batch only partially queued");
                Ok(BatchSubmission::Partial {
                    accepted,
                    report,
                    error,
                })
            }
        }
    }

    async fn push(
        &self,
        request: NotificationRequest,
        responder: Option<oneshot::Sender<DeliveryReport>>,
    ) -> Result<(), DispatchError> {
        // clone the sender so a blocked send does not hold up shutdown
        let Some(tx) = self.tx.read().await.clone() else {
            return Err(self.refuse(request.id, request.platform, DispatchError::Closed));
        };

        let request_id = request.id;
        let platform = request.platform;
        let job = Job { request, responder };

        // count before the send so a fast worker never drives the gauge negative
        DispatchMetrics::record_enqueued();
        let result = match self.policy {
            QueueFullPolicy::Block => tx.send(job).await.map_err(|_| DispatchError::Closed),
            QueueFullPolicy::Reject => tx.try_send(job).map_err(|e| match e {
                TrySendError::Full(_) => DispatchError::QueueFull,
                TrySendError::Closed(_) => DispatchError::Closed,
            }),
        };

        match result {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                DispatchMetrics::record_submitted();
                tracing::debug!(%request_id, %platform, "Request queued");
                Ok(())
            }
            Err(e) => {
                DispatchMetrics::record_dequeued();
                Err(self.refuse(request_id, platform, e))
            }
        }
    }

    fn refuse(&self, request_id: Uuid, platform: Platform, error: DispatchError) -> DispatchError {
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
        DispatchMetrics::record_rejected();
        tracing::warn!(%request_id, %platform, error = %error, "Submission refused");
        error
    }

    /// Shut down using the configured drain timeout
    pub async fn shutdown(&self) -> bool {
        self.shutdown_with_timeout(self.shutdown_timeout).await
    }

    /// Stop accepting requests and wait for the workers to drain the queue.
    ///
    /// Returns `false` if the queue was not drained within `drain_timeout`.
    /// The workers keep running and a later call waits for them again.
    pub async fn shutdown_with_timeout(&self, drain_timeout: Duration) -> bool {
        if self.tx.write().await.take().is_none() {
            tracing::debug!("Dispatcher already shut down");
        }

        let mut workers = self.workers.lock().await;
        tracing::info!(workers = workers.len(), timeout = ?drain_timeout, "Draining dispatch queue");

        let joined = tokio::time::timeout(drain_timeout, join_all(workers.iter_mut())).await;
        match joined {
            Ok(results) => {
                for result in results.into_iter().filter_map(|r| r.err()) {
                    tracing::error!(error = %result, "Dispatch worker ended abnormally");
                }
                workers.clear();
                tracing::info!("Dispatcher shut down");
                true
            }
            Err(_) => {
                // handles that already yielded must not be polled again
                workers.retain(|handle| !handle.is_finished());
                tracing::warn!(
                    timeout = ?drain_timeout,
                    remaining = workers.len(),
                    "Dispatch queue not drained before timeout"
                );
                false
            }
        }
    }
}
