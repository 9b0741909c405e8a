use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{NotificationRequest, Platform};

/// Result classification of one recipient in one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    #[serde(rename = "succeeded-push")]
    Succeeded,
    #[serde(rename = "failed-push")]
    Failed,
}

/// Per-recipient delivery record returned to synchronous callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub platform: Platform,
    /// Device token, topic, or serialized web subscription
    pub token: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub logged_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn succeeded(req: &NotificationRequest, token: String) -> Self {
        Self::new(LogKind::Succeeded, req, token, None)
    }

    pub fn failed(req: &NotificationRequest, token: String, error: Option<String>) -> Self {
        Self::new(LogKind::Failed, req, token, error)
    }

    fn new(kind: LogKind, req: &NotificationRequest, token: String, error: Option<String>) -> Self {
        Self {
            kind,
            platform: req.platform,
            token,
            message: req.message.clone(),
            title: req.title.clone(),
            error,
            logged_at: Utc::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.kind == LogKind::Failed
    }
}
