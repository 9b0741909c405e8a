//! Gateway client abstraction.
//!
//! A `PlatformClient` performs one delivery attempt against an external push
//! gateway (APNs, FCM, a Web Push endpoint). Concrete clients live outside
//! this crate; the sender only relies on the contract below.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::notification::Recipient;

use super::payload::PushPayload;

/// A gateway-level condition that prevents the whole attempt.
///
/// Per-recipient rejections are not errors; they are failed `DeliveryOutcome`s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Credential was refused or malformed
    #[error("credential rejected: {0}")]
    Credential(String),

    /// Connection or protocol failure talking to the gateway
    #[error("transport error: {0}")]
    Transport(String),
}

/// Outcome of one recipient in one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub recipient: Recipient,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// HTTP status returned by the gateway, when one was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl DeliveryOutcome {
    pub fn delivered(recipient: Recipient) -> Self {
        Self {
            recipient,
            success: true,
            error: None,
            status_code: None,
        }
    }

    pub fn failed(recipient: Recipient, error: impl Into<String>) -> Self {
        Self {
            recipient,
            success: false,
            error: Some(error.into()),
            status_code: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

/// One delivery attempt against a gateway.
///
/// # Contract
///
/// - Returns exactly one outcome per recipient, in recipient order.
/// - Ordinary per-recipient failures are encoded as failed outcomes.
/// - `Err` is reserved for conditions that fail the whole attempt.
/// - Must not panic on bad input.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn attempt(
        &self,
        recipients: &[Recipient],
        payload: &PushPayload,
        credential: Option<&str>,
    ) -> Result<Vec<DeliveryOutcome>, ClientError>;
}
