use std::sync::Arc;

use serde::Serialize;

use crate::config::PlatformConfig;
use crate::metrics::PushMetrics;
use crate::notification::{validate, LogEntry, NotificationRequest, Platform, Recipient, ValidationError};
use crate::stats::CounterStore;

use super::client::{DeliveryOutcome, PlatformClient};
use super::payload::PushPayload;

/// How the submitter waits for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Return once the request is queued
    #[default]
    Async,
    /// Wait for the final outcome and collect the delivery log
    Sync,
}

impl DeliveryMode {
    pub fn is_sync(&self) -> bool {
        matches!(self, DeliveryMode::Sync)
    }
}

/// Outcome of delivering one request to its platform
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryReport {
    /// Per-recipient entries for every attempt (synchronous mode only)
    pub log: Vec<LogEntry>,
    /// Whether the final attempt still had at least one failed recipient
    pub had_failure: bool,
    /// Number of attempts made
    pub attempts: u32,
    /// Validation failure that prevented any attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<ValidationError>,
}

impl DeliveryReport {
    pub fn rejected(error: ValidationError) -> Self {
        Self {
            log: Vec::new(),
            had_failure: true,
            attempts: 0,
            rejected: Some(error),
        }
    }
}

/// Delivers requests for one platform: validate, attempt, retry, log, count.
pub struct PlatformSender {
    platform: Platform,
    config: PlatformConfig,
    client: Arc<dyn PlatformClient>,
    store: Arc<dyn CounterStore>,
}

impl PlatformSender {
    pub fn new(
        platform: Platform,
        config: PlatformConfig,
        client: Arc<dyn PlatformClient>,
        store: Arc<dyn CounterStore>,
    ) -> Self {
        Self {
            platform,
            config,
            client,
            store,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Deliver a request, retrying the whole recipient batch while any
    /// recipient fails and the attempt budget allows.
    ///
    /// Counters are incremented after every attempt, including retried ones.
    /// Gateway errors never escape; they become failed outcomes.
    #[tracing::instrument(
        name = "sender.send",
        skip(self, req, mode),
        fields(request_id = %req.id, platform = %self.platform, sync = mode.is_sync())
    )]
    pub async fn send(&self, req: &NotificationRequest, mode: DeliveryMode) -> DeliveryReport {
        tracing::debug!("Start push notification");

        if let Err(e) = validate(req) {
            tracing::error!(error = %e, "Request error");
            PushMetrics::record_validation_failure(self.platform);
            return DeliveryReport::rejected(e);
        }

        let credential = req
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .or(self.config.api_key.as_deref());
        let budget = req.retry_budget(self.config.max_retry);
        let recipients = req.recipients();
        let payload = PushPayload::build(req);

        let mut log = Vec::new();
        let mut failed = false;
        let mut attempts = 0;

        for attempt in 1..=budget {
            attempts = attempt;
            PushMetrics::record_attempt(self.platform);

            let outcomes = self.attempt(&recipients, &payload, credential).await;

            let mut success_count = 0u64;
            let mut failure_count = 0u64;

            for outcome in outcomes {
                let token = outcome.recipient.log_token();
                if outcome.success {
                    success_count += 1;
                    tracing::info!(attempt, token = %token, "Succeeded push");
                    if mode.is_sync() {
                        log.push(LogEntry::succeeded(req, token));
                    }
                } else {
                    failure_count += 1;
                    let error = self.error_text(&outcome);
                    tracing::error!(
                        attempt,
                        token = %token,
                        error = error.as_deref().unwrap_or("unknown"),
                        "Failed push"
                    );
                    if mode.is_sync() {
                        log.push(LogEntry::failed(req, token, error));
                    }
                }
            }

            tracing::debug!(
                attempt,
                success_count,
                failure_count,
                "Push attempt finished"
            );
            self.record(success_count, failure_count).await;

            failed = failure_count > 0;
            if !failed {
                break;
            }
            if attempt < budget {
                PushMetrics::record_retry(self.platform);
                tracing::warn!(attempt, budget, "Retrying push for all recipients");
            }
        }

        DeliveryReport {
            log,
            had_failure: failed,
            attempts,
            rejected: None,
        }
    }

    /// One pass over every recipient; gateway errors fail the whole pass.
    async fn attempt(
        &self,
        recipients: &[Recipient],
        payload: &PushPayload,
        credential: Option<&str>,
    ) -> Vec<DeliveryOutcome> {
        match self.client.attempt(recipients, payload, credential).await {
            Ok(outcomes) if outcomes.len() == recipients.len() => outcomes,
            Ok(outcomes) => {
                let reason = format!(
                    "gateway returned {} outcomes for {} recipients",
                    outcomes.len(),
                    recipients.len()
                );
                tracing::warn!(reason = %reason, "Platform client broke the outcome contract");
                fail_all(recipients, &reason)
            }
            Err(e) => {
                tracing::error!(error = %e, "Platform client failed the attempt");
                fail_all(recipients, &e.to_string())
            }
        }
    }

    /// Web failures that carry an HTTP status are logged by status code alone.
    fn error_text(&self, outcome: &DeliveryOutcome) -> Option<String> {
        match (self.platform, outcome.status_code) {
            (Platform::Web, Some(status)) => Some(status.to_string()),
            _ => outcome.error.clone(),
        }
    }

    async fn record(&self, success_count: u64, failure_count: u64) {
        PushMetrics::record_delivered(self.platform, success_count);
        PushMetrics::record_failed(self.platform, failure_count);

        if success_count > 0 {
            if let Err(e) = self.store.increment_success(self.platform, success_count).await {
                tracing::warn!(error = %e, count = success_count, "Failed to record success count");
            }
        }
        if failure_count > 0 {
            if let Err(e) = self.store.increment_failure(self.platform, failure_count).await {
                tracing::warn!(error = %e, count = failure_count, "Failed to record failure count");
            }
        }
    }
}

fn fail_all(recipients: &[Recipient], reason: &str) -> Vec<DeliveryOutcome> {
    recipients
        .iter()
        .cloned()
        .map(|r| DeliveryOutcome::failed(r, reason))
        .collect()
}
