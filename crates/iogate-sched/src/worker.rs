//! Worker boundary: addressable endpoints, the per-dispatch request
//! envelope, and the liveness watch that converts worker death into a
//! scheduler event.

use std::fmt;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::scheduler::SchedulerEvent;

/// Unique token pairing a dispatched operation with its eventual
/// completion or failure signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(pub u64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One dispatched operation as delivered to a worker.
///
/// The worker must eventually call
/// [`CompletionSender::complete`] with the echoed `correlation_id`,
/// or terminate (dropping its request receiver), which the liveness
/// watch reports as a failure.
#[derive(Debug)]
pub struct WorkerRequest {
    /// Identifier the worker must echo back with its reply.
    pub correlation_id: CorrelationId,
    /// Opaque operation payload.
    pub payload: Bytes,
    /// Reply path back into the scheduler.
    pub completions: CompletionSender,
}

/// Addressable endpoint for a worker that performs I/O operations.
///
/// The transport is an in-process unbounded channel; a worker that drops
/// its receiver is considered dead.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: mpsc::UnboundedSender<WorkerRequest>,
}

impl WorkerHandle {
    /// Creates a worker endpoint, returning the handle and the receiver
    /// the worker must service.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkerRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns true if the worker still holds its request receiver.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Fire-and-forget send. Returns false if the worker is already gone;
    /// the liveness watch resolves that case through the failure path.
    pub(crate) fn send(&self, request: WorkerRequest) -> bool {
        self.tx.send(request).is_ok()
    }

    pub(crate) fn sender(&self) -> &mpsc::UnboundedSender<WorkerRequest> {
        &self.tx
    }
}

/// Sender half used by workers to report completions and failures back
/// into the scheduler.
///
/// Late or duplicate reports are discarded by the scheduler, so calling
/// these after the operation has already resolved is harmless.
#[derive(Debug, Clone)]
pub struct CompletionSender {
    tx: mpsc::UnboundedSender<SchedulerEvent>,
}

impl CompletionSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        Self { tx }
    }

    /// Reports a successful reply for the given correlation id.
    pub fn complete(&self, correlation_id: CorrelationId, value: Bytes) {
        let _ = self.tx.send(SchedulerEvent::Complete {
            correlation_id,
            value,
        });
    }

    /// Reports that the worker servicing `correlation_id` terminated
    /// before replying, with a reason the caller will observe.
    pub fn fail(&self, correlation_id: CorrelationId, reason: impl Into<String>) {
        let _ = self.tx.send(SchedulerEvent::WorkerDown {
            correlation_id,
            reason: reason.into(),
        });
    }
}

/// Liveness watch on a worker, established at dispatch and released
/// exactly once on the first of completion or failure.
///
/// The watch task waits for the worker's request channel to close, which
/// happens when the worker drops its receiver (crash, exit), and injects
/// a [`SchedulerEvent::WorkerDown`] for the watched correlation id. A
/// watch firing for an already-resolved id is discarded by the scheduler.
#[derive(Debug)]
pub struct WorkerWatch {
    cancel: Option<oneshot::Sender<()>>,
}

impl WorkerWatch {
    /// Spawns the watch task for one dispatched operation.
    pub(crate) fn spawn(
        worker: &WorkerHandle,
        correlation_id: CorrelationId,
        events: mpsc::UnboundedSender<SchedulerEvent>,
    ) -> Self {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let request_tx = worker.sender().clone();
        tokio::spawn(async move {
            // Biased so a delivered cancel always wins over a worker
            // channel that closed in the same instant.
            tokio::select! {
                biased;
                _ = cancel_rx => {}
                _ = request_tx.closed() => {
                    debug!(%correlation_id, "worker channel closed before reply");
                    let _ = events.send(SchedulerEvent::WorkerDown {
                        correlation_id,
                        reason: "worker terminated before replying".to_string(),
                    });
                }
            }
        });
        Self {
            cancel: Some(cancel_tx),
        }
    }

    /// Cancels the watch so a later worker exit produces no signal.
    pub(crate) fn cancel(mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }
}
