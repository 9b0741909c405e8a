use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;

/// Delivery platform a request targets.
///
/// Wire values follow the historical push API: `1` = iOS, `2` = Android, `3` = Web.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Platform {
    /// Apple Push Notification service
    Ios,
    /// Firebase Cloud Messaging
    Android,
    /// Web Push (browser endpoints)
    Web,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Ios, Platform::Android, Platform::Web];

    /// Short lowercase name used in metric labels and storage keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for Platform {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Platform::Ios),
            2 => Ok(Platform::Android),
            3 => Ok(Platform::Web),
            other => Err(ValidationError::UnknownPlatform(other)),
        }
    }
}

impl From<Platform> for u8 {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Ios => 1,
            Platform::Android => 2,
            Platform::Web => 3,
        }
    }
}

/// Gateway delivery priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// Web Push subscription as handed out by the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub endpoint: String,
    /// p256dh public key
    pub key: String,
    pub auth: String,
}

impl Subscription {
    /// Compact JSON form used as the recipient identifier in delivery logs
    pub fn to_log_token(&self) -> String {
        serde_json::json!({
            "endpoint": self.endpoint,
            "key": self.key,
            "auth": self.auth,
        })
        .to_string()
    }
}

/// A single addressable delivery target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Recipient {
    /// Device registration token
    Token(String),
    /// FCM topic (`/topics/...`) or condition expression
    Topic(String),
    /// Web Push subscription
    Subscription(Subscription),
}

impl Recipient {
    /// Identifier written to delivery logs
    pub fn log_token(&self) -> String {
        match self {
            Recipient::Token(token) | Recipient::Topic(token) => token.clone(),
            Recipient::Subscription(sub) => sub.to_log_token(),
        }
    }
}

/// FCM notification block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FcmNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_action: Option<String>,
}

/// APNs alert dictionary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Alert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_loc_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub loc_args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title_loc_args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_loc_key: Option<String>,
}

/// Android (FCM) specific options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidOptions {
    /// Single target: a registration token or `/topics/<name>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapse_key: Option<String>,
    pub delay_while_idle: bool,
    /// Seconds the gateway keeps the message; zero is a legal value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restricted_package_name: Option<String>,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<FcmNotification>,
}

/// iOS (APNs) specific options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IosOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apns_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapse_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Badge count; zero clears the badge and differs from "unset"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "thread-id", skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(rename = "url-args", skip_serializing_if = "Vec::is_empty")]
    pub url_args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    #[serde(rename = "mutable-content")]
    pub mutable_content: bool,
    pub production: bool,
    pub development: bool,
    pub voip: bool,
}

/// One push notification request.
///
/// Only the fields belonging to `platform` are read; the rest are ignored.
/// The request carries no dispatch state: synchronous completion and the
/// delivery log are owned by the dispatch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscriptions: Vec<Subscription>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub content_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub data: serde_json::Map<String, serde_json::Value>,
    /// Per-request cap on delivery attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    /// Credential override for the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(flatten)]
    pub android: AndroidOptions,
    #[serde(flatten)]
    pub ios: IosOptions,
}

impl NotificationRequest {
    /// Create an empty request for a platform
    pub fn new(platform: Platform) -> Self {
        Self {
            id: Uuid::new_v4(),
            platform,
            tokens: Vec::new(),
            subscriptions: Vec::new(),
            message: String::new(),
            title: None,
            priority: Priority::default(),
            content_available: false,
            sound: None,
            data: serde_json::Map::new(),
            retry: None,
            api_key: None,
            android: AndroidOptions::default(),
            ios: IosOptions::default(),
        }
    }

    /// Create a builder for a platform
    pub fn builder(platform: Platform) -> NotificationRequestBuilder {
        NotificationRequestBuilder::new(platform)
    }

    /// Whether the request addresses an FCM topic or condition instead of tokens
    pub fn is_topic(&self) -> bool {
        let to_topic = self.platform == Platform::Android
            && self
                .android
                .to
                .as_deref()
                .is_some_and(|to| to.starts_with("/topics/"));
        let has_condition = self
            .android
            .condition
            .as_deref()
            .is_some_and(|c| !c.is_empty());
        to_topic || has_condition
    }

    /// Delivery targets for the declared platform, in request order
    pub fn recipients(&self) -> Vec<Recipient> {
        match self.platform {
            Platform::Web => self
                .subscriptions
                .iter()
                .cloned()
                .map(Recipient::Subscription)
                .collect(),
            Platform::Ios => self.tokens.iter().cloned().map(Recipient::Token).collect(),
            Platform::Android => {
                if !self.tokens.is_empty() {
                    return self.tokens.iter().cloned().map(Recipient::Token).collect();
                }
                let target = self
                    .android
                    .to
                    .clone()
                    .filter(|to| !to.is_empty())
                    .or_else(|| self.android.condition.clone().filter(|c| !c.is_empty()));
                match target {
                    Some(t) if self.is_topic() => vec![Recipient::Topic(t)],
                    Some(t) => vec![Recipient::Token(t)],
                    None => Vec::new(),
                }
            }
        }
    }

    /// Number of attempts allowed for this request given the platform maximum
    pub fn retry_budget(&self, configured_max: u32) -> u32 {
        effective_retry_budget(configured_max, self.retry)
    }
}

/// Attempt budget: the override applies only when `0 < override < configured_max`.
/// At least one attempt is always made.
pub fn effective_retry_budget(configured_max: u32, retry_override: Option<u32>) -> u32 {
    let budget = match retry_override {
        Some(r) if r > 0 && r < configured_max => r,
        _ => configured_max,
    };
    budget.max(1)
}

/// Builder for notification requests
#[derive(Debug, Clone)]
pub struct NotificationRequestBuilder {
    request: NotificationRequest,
}

impl NotificationRequestBuilder {
    pub fn new(platform: Platform) -> Self {
        Self {
            request: NotificationRequest::new(platform),
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.request.tokens.push(token.into());
        self
    }

    pub fn tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.tokens.extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn subscription(mut self, subscription: Subscription) -> Self {
        self.request.subscriptions.push(subscription);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.request.message = message.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.request.title = Some(title.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.request.priority = priority;
        self
    }

    pub fn sound(mut self, sound: impl Into<String>) -> Self {
        self.request.sound = Some(sound.into());
        self
    }

    pub fn data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.request.data.insert(key.into(), value);
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.request.retry = Some(retry);
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.request.api_key = Some(api_key.into());
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.request.android.to = Some(to.into());
        self
    }

    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.request.android.condition = Some(condition.into());
        self
    }

    pub fn time_to_live(mut self, seconds: u32) -> Self {
        self.request.android.time_to_live = Some(seconds);
        self
    }

    pub fn badge(mut self, badge: i32) -> Self {
        self.request.ios.badge = Some(badge);
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.request.ios.topic = Some(topic.into());
        self
    }

    pub fn build(self) -> NotificationRequest {
        self.request
    }
}
