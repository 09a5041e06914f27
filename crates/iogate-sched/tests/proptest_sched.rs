//! Property-based tests for the iogate scheduler using proptest.
//!
//! Each case drives a real scheduler task on a current-thread runtime
//! with a gated worker, checking the admission ceiling and the
//! exactly-one-reply guarantee over randomized submission batches and
//! completion orders.

use std::time::Duration;

use bytes::Bytes;
use iogate_sched::{IoClass, SchedConfig, Scheduler, WorkerHandle, WorkerRequest};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn any_class() -> impl Strategy<Value = IoClass> {
    prop_oneof![Just(IoClass::Interactive), Just(IoClass::Compaction)]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn echo_back(req: WorkerRequest) {
    let value = req.payload.clone();
    req.completions.complete(req.correlation_id, value);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// With every dispatched operation held back, the number handed to the
    /// worker is exactly min(submitted, max_inflight); after releasing, each
    /// caller gets its own payload back exactly once.
    #[test]
    fn ceiling_holds_and_every_caller_replied(
        max_inflight in 1usize..6,
        ratio in 0.0f64..=1.0,
        classes in proptest::collection::vec(any_class(), 1..40),
        seed in any::<u64>(),
    ) {
        let rt = runtime();
        rt.block_on(async move {
            let handle = Scheduler::start_seeded(
                SchedConfig { max_inflight, compaction_ratio: ratio },
                seed,
            )
            .unwrap();
            let (worker, mut worker_rx) = WorkerHandle::channel();

            let total = classes.len();
            let mut callers = Vec::with_capacity(total);
            for (i, class) in classes.into_iter().enumerate() {
                let h = handle.clone();
                let w = worker.clone();
                callers.push(tokio::spawn(async move {
                    h.submit(w, Bytes::from(vec![i as u8]), class).await
                }));
            }

            // Wait until every submission has been admitted.
            let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
            loop {
                let s = handle.stats();
                if (s.submitted[0] + s.submitted[1]) as usize == total {
                    break;
                }
                assert!(
                    tokio::time::Instant::now() < deadline,
                    "submissions not admitted in time"
                );
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;

            // Nothing completed yet, so dispatches stop at the ceiling.
            let mut held = Vec::new();
            while let Ok(req) = worker_rx.try_recv() {
                held.push(req);
            }
            assert_eq!(held.len(), total.min(max_inflight));

            // Release everything; freed slots pull in the rest.
            let mut completed = held.len();
            for req in held.drain(..) {
                echo_back(req);
            }
            while completed < total {
                let req = tokio::time::timeout(Duration::from_secs(5), worker_rx.recv())
                    .await
                    .expect("timed out waiting for a dispatch")
                    .expect("worker channel closed");
                echo_back(req);
                completed += 1;
            }

            for (i, caller) in callers.into_iter().enumerate() {
                let reply = caller.await.unwrap().unwrap();
                assert_eq!(reply.as_ref(), &[i as u8], "caller {i} got a foreign reply");
            }

            let stats = handle.stats();
            assert_eq!(stats.completed as usize, total);
            assert_eq!(stats.total_dispatched() as usize, total);
            assert_eq!(stats.stale_signals, 0);
        });
    }

    /// Completing in-flight operations in arbitrary order still routes each
    /// reply to the right caller.
    #[test]
    fn out_of_order_completions_route_correctly(
        max_inflight in 2usize..6,
        n in 2usize..30,
        seed in any::<u64>(),
    ) {
        let rt = runtime();
        rt.block_on(async move {
            let handle = Scheduler::start_seeded(
                SchedConfig { max_inflight, compaction_ratio: 0.5 },
                seed,
            )
            .unwrap();
            let (worker, mut worker_rx) = WorkerHandle::channel();

            let mut callers = Vec::with_capacity(n);
            for i in 0..n {
                let class = if i % 2 == 0 {
                    IoClass::Interactive
                } else {
                    IoClass::Compaction
                };
                let h = handle.clone();
                let w = worker.clone();
                callers.push(tokio::spawn(async move {
                    h.submit(w, Bytes::from(vec![i as u8]), class).await
                }));
            }

            let mut rng = StdRng::seed_from_u64(seed);
            let mut buffer: Vec<WorkerRequest> = Vec::new();
            let mut received = 0usize;
            let mut completed = 0usize;
            while completed < n {
                while let Ok(req) = worker_rx.try_recv() {
                    buffer.push(req);
                    received += 1;
                }
                if buffer.is_empty() {
                    let req = tokio::time::timeout(Duration::from_secs(5), worker_rx.recv())
                        .await
                        .expect("scheduler stopped dispatching")
                        .expect("worker channel closed");
                    buffer.push(req);
                    received += 1;
                    continue;
                }
                assert!(received <= n);
                let idx = rng.gen_range(0..buffer.len());
                let req = buffer.swap_remove(idx);
                echo_back(req);
                completed += 1;
            }

            for (i, caller) in callers.into_iter().enumerate() {
                let reply = caller.await.unwrap().unwrap();
                assert_eq!(reply.as_ref(), &[i as u8], "caller {i} got a foreign reply");
            }
        });
    }
}
