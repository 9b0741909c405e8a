//! Bounded dispatch queue and worker pool.
//!
//! Callers submit requests to a [`Dispatcher`]; a fixed number of workers
//! take them off the queue and hand them to the matching platform sender.

mod dispatcher;
mod worker;

pub use dispatcher::{
    BatchReport, BatchSubmission, Dispatcher, DispatcherBuilder, DispatcherStats,
    DispatcherStatsSnapshot, Submission,
};
