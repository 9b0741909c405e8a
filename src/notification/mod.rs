//! Notification request model, validation, and delivery log entries.

mod log;
mod types;
mod validate;

pub use log::{LogEntry, LogKind};
pub use types::{
    effective_retry_budget, Alert, AndroidOptions, FcmNotification, IosOptions,
    NotificationRequest, NotificationRequestBuilder, Platform, Priority, Recipient, Subscription,
};
pub use validate::{validate, ValidationError, MAX_ANDROID_TOKENS, MAX_ANDROID_TTL_SECONDS};
