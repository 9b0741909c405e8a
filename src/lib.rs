// Shared components
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Domain
pub mod notification;
pub mod stats;

// Delivery
pub mod dispatch;
pub mod platform;

pub use dispatch::{Dispatcher, Submission};
pub use notification::{NotificationRequest, Platform};
pub use platform::{DeliveryMode, DeliveryReport};
