use thiserror::Error;

pub use crate::notification::ValidationError;
pub use crate::platform::ClientError;
pub use crate::stats::StoreError;
pub use crate::telemetry::TelemetryError;

/// Submission-side failures of the dispatch queue.
///
/// Delivery failures are never reported here; they live in the
/// `DeliveryReport` of synchronous submissions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("dispatch queue is full")]
    QueueFull,

    #[error("dispatcher is shut down")]
    Closed,

    #[error("delivery was interrupted before completion")]
    Interrupted,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Stats store error: {0}")]
    Store(#[from] StoreError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}

pub type Result<T> = std::result::Result<T, AppError>;
