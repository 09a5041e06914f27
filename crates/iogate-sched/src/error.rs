//! Error types for the scheduler core.

use thiserror::Error;

/// Result type alias for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Error variants surfaced by the scheduler.
///
/// Stale completion signals (a completion or failure for a correlation id
/// no longer tracked) are deliberately not represented here: they are
/// discarded silently so that duplicate or late signals cannot corrupt
/// state or double-reply a caller.
#[derive(Debug, Error)]
pub enum SchedError {
    /// The targeted worker terminated before producing a reply.
    /// The operation is not retried.
    #[error("worker failed before replying: {reason}")]
    WorkerFailed {
        /// Description of why the worker terminated.
        reason: String,
    },

    /// Invalid startup configuration; fatal, the scheduler does not start.
    #[error("invalid scheduler configuration: {reason}")]
    InvalidConfig {
        /// Description of the rejected value.
        reason: String,
    },

    /// The scheduler task is gone; the submission cannot be serviced.
    #[error("scheduler shut down")]
    Shutdown,
}
