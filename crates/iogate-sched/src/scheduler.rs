//! Serialized scheduling core: admission control, weighted class
//! selection, dispatch, and completion routing.
//!
//! All scheduler state is owned by one spawned task and mutated one event
//! at a time, so no locking is needed anywhere in the core. Callers block
//! on a per-submission oneshot until the completion router resolves it.

use std::collections::HashMap;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::class::IoClass;
use crate::config::SchedConfig;
use crate::error::{SchedError, SchedResult};
use crate::queue::{ClassQueues, PendingIo};
use crate::worker::{CompletionSender, CorrelationId, WorkerHandle, WorkerRequest, WorkerWatch};

/// Events processed by the scheduler task, strictly one at a time.
#[derive(Debug)]
pub enum SchedulerEvent {
    /// A caller submitted a new operation.
    Submit(PendingIo),
    /// A worker replied for a dispatched operation.
    Complete {
        /// Identifier assigned at dispatch time.
        correlation_id: CorrelationId,
        /// The worker's reply, delivered to the caller as the success value.
        value: Bytes,
    },
    /// A worker terminated before replying for a dispatched operation.
    WorkerDown {
        /// Identifier assigned at dispatch time.
        correlation_id: CorrelationId,
        /// Termination reason, delivered to the caller in the failure result.
        reason: String,
    },
}

/// Counters tracked by the scheduler, indexed per class where relevant
/// (`[Interactive, Compaction]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedStats {
    /// Operations submitted, per class.
    pub submitted: [u64; 2],
    /// Operations dispatched to a worker, per class.
    pub dispatched: [u64; 2],
    /// Operations that completed successfully.
    pub completed: u64,
    /// Operations resolved as failed because their worker died.
    pub worker_failures: u64,
    /// Completion or failure signals discarded because their correlation
    /// id was no longer tracked.
    pub stale_signals: u64,
}

impl SchedStats {
    /// Records a submission for the given class.
    #[inline]
    pub fn record_submit(&mut self, class: IoClass) {
        self.submitted[class.as_index()] += 1;
    }

    /// Records a dispatch for the given class.
    #[inline]
    pub fn record_dispatch(&mut self, class: IoClass) {
        self.dispatched[class.as_index()] += 1;
    }

    /// Returns the number of dispatches for the given class.
    #[inline]
    pub fn dispatched_for(&self, class: IoClass) -> u64 {
        self.dispatched[class.as_index()]
    }

    /// Returns the total number of dispatches across both classes.
    #[inline]
    pub fn total_dispatched(&self) -> u64 {
        self.dispatched.iter().sum()
    }
}

/// A dispatched operation awaiting its completion or failure signal.
#[derive(Debug)]
struct RunningIo {
    class: IoClass,
    reply: oneshot::Sender<SchedResult<Bytes>>,
    watch: WorkerWatch,
}

/// Cloneable handle for submitting operations to a running scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    events: mpsc::UnboundedSender<SchedulerEvent>,
    stats: watch::Receiver<SchedStats>,
}

impl SchedulerHandle {
    /// Submits an operation and blocks until the worker's reply or a
    /// failure result arrives. There is no timeout; callers that need one
    /// must wrap this themselves. Safe to call from arbitrarily many
    /// tasks concurrently.
    pub async fn submit(
        &self,
        worker: WorkerHandle,
        payload: Bytes,
        class: IoClass,
    ) -> SchedResult<Bytes> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let pending = PendingIo {
            worker,
            payload,
            class,
            reply: reply_tx,
        };
        self.events
            .send(SchedulerEvent::Submit(pending))
            .map_err(|_| SchedError::Shutdown)?;
        reply_rx.await.map_err(|_| SchedError::Shutdown)?
    }

    /// Returns a snapshot of the scheduler counters.
    pub fn stats(&self) -> SchedStats {
        self.stats.borrow().clone()
    }

    /// Returns a sender workers can use to report completions.
    pub fn completion_sender(&self) -> CompletionSender {
        CompletionSender::new(self.events.clone())
    }

    /// Returns true if the scheduler task is still running.
    pub fn is_running(&self) -> bool {
        !self.events.is_closed()
    }
}

/// The scheduling core. Owns all mutable state; runs as one task.
pub struct Scheduler {
    config: SchedConfig,
    queues: ClassQueues,
    running: HashMap<CorrelationId, RunningIo>,
    next_id: u64,
    rng: StdRng,
    stats: SchedStats,
    /// Weak so the event loop ends once all handles and in-flight
    /// resolution paths are gone.
    events: mpsc::WeakUnboundedSender<SchedulerEvent>,
    stats_tx: watch::Sender<SchedStats>,
}

impl Scheduler {
    /// Validates the configuration and starts the scheduler task.
    /// Returns a handle for submitting operations.
    pub fn start(config: SchedConfig) -> SchedResult<SchedulerHandle> {
        Self::start_with_rng(config, StdRng::from_entropy())
    }

    /// Starts the scheduler with a deterministic random source so the
    /// class-selection draws are reproducible in tests.
    pub fn start_seeded(config: SchedConfig, seed: u64) -> SchedResult<SchedulerHandle> {
        Self::start_with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn start_with_rng(config: SchedConfig, rng: StdRng) -> SchedResult<SchedulerHandle> {
        config.validate()?;
        debug!(
            max_inflight = config.max_inflight,
            compaction_ratio = config.compaction_ratio,
            "starting scheduler"
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stats_tx, stats_rx) = watch::channel(SchedStats::default());

        let core = Scheduler {
            config,
            queues: ClassQueues::new(),
            running: HashMap::new(),
            next_id: 1,
            rng,
            stats: SchedStats::default(),
            events: events_tx.downgrade(),
            stats_tx,
        };
        tokio::spawn(core.run(events_rx));

        Ok(SchedulerHandle {
            events: events_tx,
            stats: stats_rx,
        })
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SchedulerEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                SchedulerEvent::Submit(pending) => self.on_submit(pending),
                SchedulerEvent::Complete {
                    correlation_id,
                    value,
                } => self.on_complete(correlation_id, value),
                SchedulerEvent::WorkerDown {
                    correlation_id,
                    reason,
                } => self.on_worker_down(correlation_id, reason),
            }
            self.run_pass();
            let _ = self.stats_tx.send(self.stats.clone());
        }
        // Dropping self here drops queued and running entries; their reply
        // senders close and blocked callers observe SchedError::Shutdown.
        debug!(
            pending = self.queues.total_len(),
            inflight = self.running.len(),
            "scheduler event channel closed, stopping"
        );
    }

    fn on_submit(&mut self, pending: PendingIo) {
        self.stats.record_submit(pending.class);
        debug!(
            class = %pending.class,
            queued = self.queues.len(pending.class) + 1,
            "submission enqueued"
        );
        self.queues.push(pending);
    }

    /// Greedy fill: keeps selecting and dispatching until capacity is
    /// exhausted or both queues are empty. Each iteration re-runs the
    /// class-selection draw independently.
    fn run_pass(&mut self) {
        while self.running.len() < self.config.max_inflight {
            let Some(class) = self.select_class() else {
                break;
            };
            // select_class only names non-empty queues.
            let Some(pending) = self.queues.pop(class) else {
                break;
            };
            self.dispatch(pending);
        }
    }

    /// Class-selection policy: the only non-empty queue if there is one;
    /// otherwise a fresh uniform draw against `compaction_ratio`. Ratios
    /// 0.0 and 1.0 degenerate to strict priority through the same
    /// comparison, with no special casing.
    fn select_class(&mut self) -> Option<IoClass> {
        let have_interactive = self.queues.len(IoClass::Interactive) > 0;
        let have_compaction = self.queues.len(IoClass::Compaction) > 0;
        match (have_interactive, have_compaction) {
            (false, false) => None,
            (true, false) => Some(IoClass::Interactive),
            (false, true) => Some(IoClass::Compaction),
            (true, true) => {
                if self.rng.gen::<f64>() < self.config.compaction_ratio {
                    Some(IoClass::Compaction)
                } else {
                    Some(IoClass::Interactive)
                }
            }
        }
    }

    /// Hands one selected operation to its worker: assigns a fresh
    /// correlation id, establishes the liveness watch, sends the tagged
    /// request, and records the running entry. Never blocks.
    fn dispatch(&mut self, pending: PendingIo) {
        let correlation_id = CorrelationId(self.next_id);
        self.next_id += 1;

        let Some(events) = self.events.upgrade() else {
            // Tearing down: no event channel left to route a completion.
            let PendingIo { reply, .. } = pending;
            let _ = reply.send(Err(SchedError::Shutdown));
            return;
        };

        let PendingIo {
            worker,
            payload,
            class,
            reply,
        } = pending;

        let watch = WorkerWatch::spawn(&worker, correlation_id, events.clone());
        let request = WorkerRequest {
            correlation_id,
            payload,
            completions: CompletionSender::new(events),
        };
        if !worker.send(request) {
            // Worker already gone; the watch fires immediately and
            // resolves this entry through the normal failure path.
            warn!(%correlation_id, "dispatch to closed worker channel");
        }

        self.running.insert(
            correlation_id,
            RunningIo {
                class,
                reply,
                watch,
            },
        );
        self.stats.record_dispatch(class);
        debug!(
            %correlation_id,
            %class,
            inflight = self.running.len(),
            "dispatched"
        );
    }

    fn on_complete(&mut self, correlation_id: CorrelationId, value: Bytes) {
        let Some(entry) = self.running.remove(&correlation_id) else {
            self.stats.stale_signals += 1;
            debug!(%correlation_id, "stale completion signal discarded");
            return;
        };
        entry.watch.cancel();
        self.stats.completed += 1;
        debug!(
            %correlation_id,
            inflight = self.running.len(),
            "completed"
        );
        if entry.reply.send(Ok(value)).is_err() {
            debug!(%correlation_id, "caller gone before completion delivery");
        }
    }

    fn on_worker_down(&mut self, correlation_id: CorrelationId, reason: String) {
        let Some(entry) = self.running.remove(&correlation_id) else {
            self.stats.stale_signals += 1;
            debug!(%correlation_id, "stale failure signal discarded");
            return;
        };
        entry.watch.cancel();
        self.stats.worker_failures += 1;
        warn!(
            %correlation_id,
            class = %entry.class,
            %reason,
            "worker failed before replying"
        );
        if entry
            .reply
            .send(Err(SchedError::WorkerFailed { reason }))
            .is_err()
        {
            debug!(%correlation_id, "caller gone before failure delivery");
        }
    }
}
