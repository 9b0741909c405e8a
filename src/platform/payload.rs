//! Platform payload builders.
//!
//! Each platform receives its own message shape built from the request. The
//! payload does not carry recipients; the client addresses them separately.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::notification::{Alert, FcmNotification, NotificationRequest, Platform, Priority};

/// APNs priority for messages that may be delayed and grouped
pub const APNS_PRIORITY_LOW: u8 = 5;

/// APNs priority for immediate delivery
pub const APNS_PRIORITY_HIGH: u8 = 10;

/// Message body handed to a `PlatformClient`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PushPayload {
    Fcm(FcmMessage),
    Apns(ApnsNotification),
    Web(WebPushMessage),
}

impl PushPayload {
    /// Build the payload for the request's platform
    pub fn build(req: &NotificationRequest) -> Self {
        match req.platform {
            Platform::Android => PushPayload::Fcm(FcmMessage::from_request(req)),
            Platform::Ios => PushPayload::Apns(ApnsNotification::from_request(req)),
            Platform::Web => PushPayload::Web(WebPushMessage::from_request(req)),
        }
    }
}

/// FCM legacy HTTP message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FcmMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapse_key: Option<String>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub content_available: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub delay_while_idle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restricted_package_name: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<FcmNotification>,
}

impl FcmMessage {
    pub fn from_request(req: &NotificationRequest) -> Self {
        let android = &req.android;

        // explicit notification block wins; otherwise derive one from title/message
        let notification = match android.notification.clone() {
            Some(mut n) => {
                if n.sound.is_none() {
                    n.sound = req.sound.clone();
                }
                Some(n)
            }
            None if req.title.is_some() || !req.message.is_empty() => Some(FcmNotification {
                title: req.title.clone(),
                body: Some(req.message.clone()).filter(|m| !m.is_empty()),
                sound: req.sound.clone(),
                ..Default::default()
            }),
            None => None,
        };

        Self {
            to: android.to.clone().filter(|to| !to.is_empty()),
            condition: android.condition.clone().filter(|c| !c.is_empty()),
            collapse_key: android.collapse_key.clone(),
            priority: req.priority,
            content_available: req.content_available,
            delay_while_idle: android.delay_while_idle,
            time_to_live: android.time_to_live,
            restricted_package_name: android.restricted_package_name.clone(),
            dry_run: android.dry_run,
            data: req.data.clone(),
            notification,
        }
    }
}

/// `aps` dictionary of an APNs payload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Aps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub url_args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_available: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutable_content: Option<u8>,
}

/// APNs notification: request headers plus JSON body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApnsNotification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apns_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapse_id: Option<String>,
    /// Unix timestamp after which the gateway discards the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,
    pub priority: u8,
    pub voip: bool,
    pub production: bool,
    pub development: bool,
    /// Body sent to the device: `aps` plus custom data keys
    pub payload: Map<String, Value>,
}

impl ApnsNotification {
    pub fn from_request(req: &NotificationRequest) -> Self {
        let ios = &req.ios;

        let alert = match &ios.alert {
            Some(alert) => serde_json::to_value(merge_alert(alert, req)).ok(),
            None if req.title.is_some() => serde_json::to_value(Alert {
                title: req.title.clone(),
                body: Some(req.message.clone()),
                ..Default::default()
            })
            .ok(),
            None if !req.message.is_empty() => Some(Value::String(req.message.clone())),
            None => None,
        };

        let aps = Aps {
            alert,
            badge: ios.badge,
            sound: req.sound.clone(),
            category: ios.category.clone(),
            thread_id: ios.thread_id.clone(),
            url_args: ios.url_args.clone(),
            content_available: req.content_available.then_some(1),
            mutable_content: ios.mutable_content.then_some(1),
        };

        let mut payload = req.data.clone();
        if let Ok(aps) = serde_json::to_value(aps) {
            payload.insert("aps".to_string(), aps);
        }

        let priority = match req.priority {
            Priority::Normal => APNS_PRIORITY_LOW,
            Priority::High => APNS_PRIORITY_HIGH,
        };

        Self {
            topic: ios.topic.clone(),
            apns_id: ios.apns_id.clone(),
            collapse_id: ios.collapse_id.clone(),
            expiration: ios.expiration,
            priority,
            voip: ios.voip,
            production: ios.production,
            development: ios.development,
            payload,
        }
    }
}

fn merge_alert(alert: &Alert, req: &NotificationRequest) -> Alert {
    let mut alert = alert.clone();
    if alert.body.is_none() && !req.message.is_empty() {
        alert.body = Some(req.message.clone());
    }
    if alert.title.is_none() {
        alert.title = req.title.clone();
    }
    alert
}

/// Web Push message; encryption happens in the client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebPushMessage {
    pub payload: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<u32>,
}

impl WebPushMessage {
    pub fn from_request(req: &NotificationRequest) -> Self {
        Self {
            payload: req.data.clone(),
            time_to_live: req.android.time_to_live,
        }
    }
}
