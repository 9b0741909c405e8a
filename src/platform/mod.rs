//! Per-platform delivery: gateway client contract, payload builders, and the
//! sender pipeline shared by every platform.

mod client;
mod payload;
mod sender;

pub use client::{ClientError, DeliveryOutcome, PlatformClient};
pub use payload::{
    ApnsNotification, Aps, FcmMessage, PushPayload, WebPushMessage, APNS_PRIORITY_HIGH,
    APNS_PRIORITY_LOW,
};
pub use sender::{DeliveryMode, DeliveryReport, PlatformSender};
