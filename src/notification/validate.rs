//! Request validation.
//!
//! Rules are evaluated only for the request's declared platform and in a fixed
//! order; the first violated rule is reported.

use thiserror::Error;

use super::{NotificationRequest, Platform};

/// Maximum registration tokens accepted by FCM in one request
pub const MAX_ANDROID_TOKENS: usize = 1000;

/// Maximum FCM time-to-live (4 weeks) in seconds
pub const MAX_ANDROID_TTL_SECONDS: u32 = 2_419_200;

/// A request violates a shape or content rule and is never delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the message must specify at least one subscription")]
    NoSubscription,

    #[error("the message must specify at least one registration ID")]
    NoRegistrationId,

    #[error("the token must not be empty")]
    EmptyToken,

    #[error("the message may specify at most 1000 registration IDs")]
    TooManyRegistrationIds,

    #[error("the message's TimeToLive field must be an integer between 0 and 2419200 (4 weeks)")]
    TimeToLiveOutOfRange,

    #[error("unknown platform: {0}")]
    UnknownPlatform(u8),

    #[error("platform {0} is not enabled")]
    PlatformDisabled(Platform),
}

// serialized as its message text
impl serde::Serialize for ValidationError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Check a request against the rules of its platform.
pub fn validate(req: &NotificationRequest) -> Result<(), ValidationError> {
    let result = check(req);
    if let Err(ref e) = result {
        tracing::debug!(
            request_id = %req.id,
            platform = %req.platform,
            reason = %e,
            "Notification request rejected"
        );
    }
    result
}

fn check(req: &NotificationRequest) -> Result<(), ValidationError> {
    if req.platform == Platform::Web {
        if req.subscriptions.is_empty() {
            return Err(ValidationError::NoSubscription);
        }
        return Ok(());
    }

    let has_to = req.android.to.as_deref().is_some_and(|to| !to.is_empty());
    if !req.is_topic() && req.tokens.is_empty() && !has_to {
        return Err(ValidationError::NoRegistrationId);
    }

    if req.tokens.first().is_some_and(|t| t.is_empty()) {
        return Err(ValidationError::EmptyToken);
    }

    if req.platform == Platform::Android {
        if req.tokens.len() > MAX_ANDROID_TOKENS {
            return Err(ValidationError::TooManyRegistrationIds);
        }

        if req
            .android
            .time_to_live
            .is_some_and(|ttl| ttl > MAX_ANDROID_TTL_SECONDS)
        {
            return Err(ValidationError::TimeToLiveOutOfRange);
        }
    }

    Ok(())
}
