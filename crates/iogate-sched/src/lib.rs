#![warn(missing_docs)]

//! iogate scheduler core: admission control for a shared I/O resource.
//!
//! Callers submit opaque I/O operations tagged with a traffic class
//! (latency-sensitive interactive work vs. background compaction). The
//! scheduler bounds the number of operations in flight, arbitrates between
//! the two classes with a weighted random draw so that compaction is never
//! permanently starved, and correlates asynchronous worker completions (or
//! worker deaths) back to the blocked callers.

pub mod class;
pub mod config;
pub mod error;
pub mod queue;
pub mod scheduler;
pub mod worker;

pub use class::IoClass;
pub use config::SchedConfig;
pub use error::{SchedError, SchedResult};
pub use queue::{ClassQueues, PendingIo};
pub use scheduler::{SchedStats, Scheduler, SchedulerEvent, SchedulerHandle};
pub use worker::{CompletionSender, CorrelationId, WorkerHandle, WorkerRequest, WorkerWatch};
