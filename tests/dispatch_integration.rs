//! Dispatcher integration tests
//!
//! These tests drive the full path from submission through the worker pool,
//! the platform sender and the counter store, using in-process fake gateways.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};
use tokio_test::{assert_err, assert_ok};

use ara_push_dispatcher::config::{DispatchConfig, PlatformConfig, QueueFullPolicy};
use ara_push_dispatcher::dispatch::{BatchSubmission, Dispatcher, Submission};
use ara_push_dispatcher::error::DispatchError;
use ara_push_dispatcher::notification::{
    LogKind, NotificationRequest, Platform, Recipient, Subscription, ValidationError,
};
use ara_push_dispatcher::platform::{
    ClientError, DeliveryMode, DeliveryOutcome, PlatformClient, PushPayload,
};
use ara_push_dispatcher::stats::{CounterStore, MemoryCounterStore};

type Rule = Box<dyn Fn(&Recipient, usize) -> DeliveryOutcome + Send + Sync>;

/// Gateway whose per-recipient result is decided by a rule.
/// The rule receives the recipient and the 1-based call number.
struct FakeGateway {
    calls: AtomicUsize,
    rule: Rule,
}

impl FakeGateway {
    fn new(rule: impl Fn(&Recipient, usize) -> DeliveryOutcome + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            rule: Box::new(rule),
        })
    }

    fn always_ok() -> Arc<Self> {
        Self::new(|r, _| DeliveryOutcome::delivered(r.clone()))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformClient for FakeGateway {
    async fn attempt(
        &self,
        recipients: &[Recipient],
        _payload: &PushPayload,
        _credential: Option<&str>,
    ) -> Result<Vec<DeliveryOutcome>, ClientError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(recipients.iter().map(|r| (self.rule)(r, call)).collect())
    }
}

/// Gateway that reports when a delivery starts and then waits for a permit
struct GatedGateway {
    started: Notify,
    gate: Semaphore,
}

impl GatedGateway {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Notify::new(),
            gate: Semaphore::new(0),
        })
    }

    fn open(&self) {
        self.gate.add_permits(1024);
    }
}

#[async_trait]
impl PlatformClient for GatedGateway {
    async fn attempt(
        &self,
        recipients: &[Recipient],
        _payload: &PushPayload,
        _credential: Option<&str>,
    ) -> Result<Vec<DeliveryOutcome>, ClientError> {
        self.started.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        permit.forget();
        Ok(recipients.iter().cloned().map(DeliveryOutcome::delivered).collect())
    }
}

fn dispatch_config(workers: usize, capacity: usize, policy: QueueFullPolicy) -> DispatchConfig {
    DispatchConfig {
        workers,
        queue_capacity: capacity,
        queue_full_policy: policy,
        shutdown_timeout_seconds: 10,
    }
}

fn platform_config(max_retry: u32) -> PlatformConfig {
    PlatformConfig {
        enabled: true,
        api_key: Some("server-key".to_string()),
        max_retry,
        ..Default::default()
    }
}

fn subscription(name: &str) -> Subscription {
    Subscription {
        endpoint: format!("https://push.example.com/{}", name),
        key: format!("{}-key", name),
        auth: format!("{}-auth", name),
    }
}

fn android_request(tokens: &[&str]) -> NotificationRequest {
    NotificationRequest::builder(Platform::Android)
        .tokens(tokens.iter().copied())
        .message("Welcome")
        .build()
}

fn is_endpoint(recipient: &Recipient, name: &str) -> bool {
    matches!(recipient, Recipient::Subscription(s) if s.endpoint.ends_with(name))
}

#[tokio::test]
async fn test_web_retry_resends_whole_batch() {
    // subscription "b" fails on the first call only
    let gateway = FakeGateway::new(|r, call| {
        if call == 1 && is_endpoint(r, "b") {
            DeliveryOutcome::failed(r.clone(), "gone").with_status(410)
        } else {
            DeliveryOutcome::delivered(r.clone())
        }
    });
    let store = Arc::new(MemoryCounterStore::new());
    let dispatcher = Dispatcher::builder(dispatch_config(2, 16, QueueFullPolicy::Block))
        .store(store.clone())
        .platform(Platform::Web, platform_config(2), gateway.clone())
        .build();

    let req = NotificationRequest::builder(Platform::Web)
        .subscription(subscription("a"))
        .subscription(subscription("b"))
        .message("Welcome")
        .build();

    let report = dispatcher.deliver(req).await.unwrap();

    assert!(!report.had_failure);
    assert_eq!(report.attempts, 2);
    assert_eq!(gateway.calls(), 2);

    let kinds: Vec<_> = report.log.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![LogKind::Succeeded, LogKind::Failed, LogKind::Succeeded, LogKind::Succeeded]
    );
    assert_eq!(report.log[1].error.as_deref(), Some("410"));
    assert!(report.log[1].token.contains("https://push.example.com/b"));

    let counters = store.snapshot().await.unwrap().platform(Platform::Web);
    assert_eq!(counters.success, 3);
    assert_eq!(counters.failure, 1);

    assert!(dispatcher.shutdown().await);
}

#[tokio::test]
async fn test_async_submission_is_accepted_and_delivered() {
    let gateway = FakeGateway::always_ok();
    let store = Arc::new(MemoryCounterStore::new());
    let dispatcher = Dispatcher::builder(dispatch_config(2, 16, QueueFullPolicy::Block))
        .store(store.clone())
        .platform(Platform::Android, platform_config(1), gateway.clone())
        .build();

    let submission = dispatcher
        .submit(android_request(&["t1", "t2"]), DeliveryMode::Async)
        .await
        .unwrap();
    assert_eq!(submission, Submission::Accepted);

    assert!(dispatcher.shutdown().await);

    let snapshot = store.snapshot().await.unwrap();
    assert_eq!(snapshot.platform(Platform::Android).success, 2);
    assert_eq!(gateway.calls(), 1);
    assert_eq!(dispatcher.stats().completed, 1);
}

#[tokio::test]
async fn test_concurrent_workers_lose_no_counts() {
    const REQUESTS: usize = 200;
    const RECIPIENTS: usize = 3;

    // every third call fails its first recipient
    let gateway = FakeGateway::new(|r, call| {
        if call % 3 == 0 && *r == Recipient::Token("t0".to_string()) {
            DeliveryOutcome::failed(r.clone(), "Unavailable")
        } else {
            DeliveryOutcome::delivered(r.clone())
        }
    });
    let store = Arc::new(MemoryCounterStore::new());
    let dispatcher = Arc::new(
        Dispatcher::builder(dispatch_config(8, 32, QueueFullPolicy::Block))
            .store(store.clone())
            .platform(Platform::Android, platform_config(1), gateway.clone())
            .build(),
    );

    let mut handles = Vec::new();
    for _ in 0..4 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..REQUESTS / 4 {
                dispatcher
                    .enqueue(android_request(&["t0", "t1", "t2"]))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(dispatcher.shutdown().await);

    let counters = store.snapshot().await.unwrap().platform(Platform::Android);
    assert_eq!(counters.total(), (REQUESTS * RECIPIENTS) as u64);
    assert_eq!(counters.failure, (gateway.calls() / 3) as u64);

    let stats = dispatcher.stats();
    assert_eq!(stats.submitted, REQUESTS as u64);
    assert_eq!(stats.completed, REQUESTS as u64);
}

#[tokio::test]
async fn test_reject_policy_reports_full_queue() {
    let gateway = GatedGateway::new();
    let dispatcher = Dispatcher::builder(dispatch_config(1, 1, QueueFullPolicy::Reject))
        .platform(Platform::Android, platform_config(1), gateway.clone())
        .build();

    // occupy the only worker, then fill the only slot
    assert_ok!(dispatcher.enqueue(android_request(&["first"])).await);
    gateway.started.notified().await;
    assert_ok!(dispatcher.enqueue(android_request(&["second"])).await);

    let error = assert_err!(dispatcher.enqueue(android_request(&["third"])).await);
    assert_eq!(error, DispatchError::QueueFull);

    gateway.open();
    assert!(dispatcher.shutdown().await);

    let stats = dispatcher.stats();
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.completed, 2);
}

#[tokio::test]
async fn test_block_policy_waits_for_capacity() {
    let gateway = GatedGateway::new();
    let dispatcher = Arc::new(
        Dispatcher::builder(dispatch_config(1, 1, QueueFullPolicy::Block))
            .platform(Platform::Android, platform_config(1), gateway.clone())
            .build(),
    );

    dispatcher.enqueue(android_request(&["first"])).await.unwrap();
    gateway.started.notified().await;
    dispatcher.enqueue(android_request(&["second"])).await.unwrap();

    let blocked = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.enqueue(android_request(&["third"])).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!blocked.is_finished());

    gateway.open();
    assert_eq!(blocked.await.unwrap(), Ok(()));
    assert!(dispatcher.shutdown().await);
    assert_eq!(dispatcher.stats().completed, 3);
}

#[tokio::test]
async fn test_shutdown_drains_queue_and_closes_admission() {
    let gateway = FakeGateway::always_ok();
    let dispatcher = Dispatcher::builder(dispatch_config(2, 64, QueueFullPolicy::Block))
        .platform(Platform::Android, platform_config(1), gateway.clone())
        .build();

    for i in 0..20 {
        let token = format!("token-{}", i);
        dispatcher.enqueue(android_request(&[token.as_str()])).await.unwrap();
    }

    assert!(dispatcher.shutdown_with_timeout(Duration::from_secs(5)).await);
    assert_eq!(gateway.calls(), 20);
    assert_eq!(dispatcher.stats().completed, 20);

    assert_eq!(
        dispatcher.deliver(android_request(&["late"])).await,
        Err(DispatchError::Closed)
    );
}

#[tokio::test]
async fn test_shutdown_times_out_on_stuck_delivery() {
    let gateway = GatedGateway::new();
    let dispatcher = Dispatcher::builder(dispatch_config(1, 4, QueueFullPolicy::Block))
        .platform(Platform::Android, platform_config(1), gateway.clone())
        .build();

    dispatcher.enqueue(android_request(&["stuck"])).await.unwrap();
    gateway.started.notified().await;

    assert!(!dispatcher.shutdown_with_timeout(Duration::from_millis(50)).await);
    // still stuck, so a repeated shutdown must not report a drained queue
    assert!(!dispatcher.shutdown_with_timeout(Duration::from_millis(50)).await);
    assert_eq!(dispatcher.stats().completed, 0);

    gateway.open();
    assert!(dispatcher.shutdown_with_timeout(Duration::from_secs(5)).await);
    assert_eq!(dispatcher.stats().completed, 1);
}

#[tokio::test]
async fn test_panicking_client_interrupts_only_its_request() {
    let gateway = FakeGateway::new(|r, _| {
        if *r == Recipient::Token("boom".to_string()) {
            panic!("gateway exploded");
        }
        DeliveryOutcome::delivered(r.clone())
    });
    let dispatcher = Dispatcher::builder(dispatch_config(1, 8, QueueFullPolicy::Block))
        .platform(Platform::Android, platform_config(1), gateway)
        .build();

    let result = dispatcher.deliver(android_request(&["boom"])).await;
    assert_eq!(result, Err(DispatchError::Interrupted));

    // the single worker is still serving
    let report = dispatcher.deliver(android_request(&["fine"])).await.unwrap();
    assert!(!report.had_failure);

    assert!(dispatcher.shutdown().await);
    let stats = dispatcher.stats();
    assert_eq!(stats.panics, 1);
    assert_eq!(stats.completed, 1);
}

#[tokio::test]
async fn test_invalid_request_is_answered_without_delivery() {
    let gateway = FakeGateway::always_ok();
    let store = Arc::new(MemoryCounterStore::new());
    let dispatcher = Dispatcher::builder(dispatch_config(1, 8, QueueFullPolicy::Block))
        .store(store.clone())
        .platform(Platform::Android, platform_config(3), gateway.clone())
        .build();

    let report = dispatcher.deliver(android_request(&[])).await.unwrap();

    assert!(report.had_failure);
    assert_eq!(report.attempts, 0);
    assert_eq!(report.rejected, Some(ValidationError::NoRegistrationId));
    assert_eq!(gateway.calls(), 0);

    let snapshot = store.snapshot().await.unwrap();
    assert_eq!(snapshot.total_success() + snapshot.total_failure(), 0);
    assert_eq!(dispatcher.stats().validation_failures, 1);
}

#[tokio::test]
async fn test_zero_retry_override_uses_platform_budget() {
    let gateway = FakeGateway::new(|r, _| DeliveryOutcome::failed(r.clone(), "Unavailable"));
    let store = Arc::new(MemoryCounterStore::new());
    let dispatcher = Dispatcher::builder(dispatch_config(1, 8, QueueFullPolicy::Block))
        .store(store.clone())
        .platform(Platform::Android, platform_config(3), gateway.clone())
        .build();

    let req = NotificationRequest::builder(Platform::Android)
        .token("device")
        .message("hi")
        .retry(0)
        .build();
    let report = dispatcher.deliver(req).await.unwrap();

    assert!(report.had_failure);
    assert_eq!(report.attempts, 3);
    assert_eq!(gateway.calls(), 3);
    assert_eq!(report.log.len(), 3);
    assert_eq!(
        store.snapshot().await.unwrap().platform(Platform::Android).failure,
        3
    );
}

#[tokio::test]
async fn test_sync_batch_reports_in_submission_order() {
    let gateway = FakeGateway::new(|r, _| {
        if *r == Recipient::Token("bad".to_string()) {
            DeliveryOutcome::failed(r.clone(), "NotRegistered")
        } else {
            DeliveryOutcome::delivered(r.clone())
        }
    });
    let dispatcher = Dispatcher::builder(dispatch_config(4, 8, QueueFullPolicy::Block))
        .platform(Platform::Android, platform_config(1), gateway)
        .build();

    let requests = vec![
        android_request(&["one"]),
        android_request(&["bad"]),
        android_request(&["three"]),
    ];
    let submission = dispatcher
        .submit_batch(requests, DeliveryMode::Sync)
        .await
        .unwrap();

    let BatchSubmission::Completed(batch) = submission else {
        panic!("expected a completed batch");
    };
    assert!(batch.had_failure());
    let tokens: Vec<_> = batch.log().into_iter().map(|e| e.token).collect();
    assert_eq!(tokens, vec!["one", "bad", "three"]);

    let accepted = dispatcher
        .submit_batch(
            vec![android_request(&["x"]), android_request(&["y"])],
            DeliveryMode::Async,
        )
        .await
        .unwrap();
    assert_eq!(accepted, BatchSubmission::Accepted(2));

    assert!(dispatcher.shutdown().await);
    assert_eq!(dispatcher.stats().completed, 5);
}

async fn wait_for_rejections(dispatcher: &Dispatcher, count: u64) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while dispatcher.stats().rejected < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("submission was never refused");
}

#[tokio::test]
async fn test_async_batch_reports_accepted_prefix() {
    let gateway = GatedGateway::new();
    let dispatcher = Dispatcher::builder(dispatch_config(1, 1, QueueFullPolicy::Reject))
        .platform(Platform::Android, platform_config(1), gateway.clone())
        .build();

    assert_ok!(dispatcher.enqueue(android_request(&["busy"])).await);
    gateway.started.notified().await;

    let requests = vec![
        android_request(&["a"]),
        android_request(&["b"]),
        android_request(&["c"]),
    ];
    let submission = assert_ok!(dispatcher.submit_batch(requests, DeliveryMode::Async).await);

    let BatchSubmission::Partial {
        accepted,
        report,
        error,
    } = submission
    else {
        panic!("expected a partial batch");
    };
    assert_eq!(accepted, 1);
    assert!(report.reports.is_empty());
    assert_eq!(error, DispatchError::QueueFull);

    // nothing of this batch got in, so the refusal is returned directly
    let error = assert_err!(
        dispatcher
            .submit_batch(vec![android_request(&["d"])], DeliveryMode::Async)
            .await
    );
    assert_eq!(error, DispatchError::QueueFull);

    gateway.open();
    assert!(dispatcher.shutdown().await);

    let stats = dispatcher.stats();
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.rejected, 2);
    assert_eq!(stats.completed, 2);
}

#[tokio::test]
async fn test_sync_batch_waits_for_accepted_prefix() {
    let gateway = GatedGateway::new();
    let dispatcher = Arc::new(
        Dispatcher::builder(dispatch_config(1, 1, QueueFullPolicy::Reject))
            .platform(Platform::Android, platform_config(1), gateway.clone())
            .build(),
    );

    assert_ok!(dispatcher.enqueue(android_request(&["busy"])).await);
    gateway.started.notified().await;

    let batch = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            let requests = vec![
                android_request(&["a"]),
                android_request(&["b"]),
                android_request(&["c"]),
            ];
            dispatcher.submit_batch(requests, DeliveryMode::Sync).await
        })
    };

    // "b" must hit the full queue before the worker is released
    wait_for_rejections(&dispatcher, 1).await;
    gateway.open();

    let submission = assert_ok!(batch.await.unwrap());
    let BatchSubmission::Partial {
        accepted,
        report,
        error,
    } = submission
    else {
        panic!("expected a partial batch");
    };
    assert_eq!(accepted, 1);
    assert_eq!(error, DispatchError::QueueFull);
    assert!(!report.had_failure());
    let tokens: Vec<_> = report.log().into_iter().map(|e| e.token).collect();
    assert_eq!(tokens, vec!["a"]);

    assert!(dispatcher.shutdown().await);
}
