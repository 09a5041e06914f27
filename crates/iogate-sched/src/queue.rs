//! Class-partitioned FIFO queues for admitted-but-not-dispatched operations.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::class::IoClass;
use crate::error::SchedResult;
use crate::worker::WorkerHandle;

/// An admitted operation waiting to be dispatched.
#[derive(Debug)]
pub struct PendingIo {
    /// The worker that will service this operation.
    pub worker: WorkerHandle,
    /// Opaque operation payload, forwarded to the worker untouched.
    pub payload: Bytes,
    /// Traffic class used for queue selection.
    pub class: IoClass,
    /// Reply slot for the blocked caller; resolved exactly once.
    pub reply: oneshot::Sender<SchedResult<Bytes>>,
}

/// Two FIFO queues, one per traffic class.
///
/// Only ever touched from the scheduler task, so no internal locking.
/// Insertion order within a class is dispatch order.
#[derive(Debug, Default)]
pub struct ClassQueues {
    queues: [VecDeque<PendingIo>; 2],
}

impl ClassQueues {
    /// Creates a pair of empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail of the queue named by `io.class`. O(1).
    pub fn push(&mut self, io: PendingIo) {
        self.queues[io.class.as_index()].push_back(io);
    }

    /// Removes and returns the head of the given class queue. O(1).
    pub fn pop(&mut self, class: IoClass) -> Option<PendingIo> {
        self.queues[class.as_index()].pop_front()
    }

    /// Returns the number of pending operations in the given class.
    #[inline]
    pub fn len(&self, class: IoClass) -> usize {
        self.queues[class.as_index()].len()
    }

    /// Returns the total number of pending operations across both classes.
    #[inline]
    pub fn total_len(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    /// Returns true if both class queues are empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }
}
