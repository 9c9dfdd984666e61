use super::worker::{ReconciliationWorker, WorkerContext};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Count of running workers, shared lock-free between the autoscaler and the workers.
#[derive(Clone, Default)]
pub struct WorkerCounter {
    active: Arc<AtomicUsize>,
}

impl WorkerCounter {
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Claims a worker slot unless `ceiling` workers are already running.
    ///
    /// Check and increment happen in one CAS loop, so concurrent claims can
    /// never overshoot the ceiling.
    pub fn try_acquire(&self, ceiling: usize) -> Option<WorkerSlot> {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < ceiling).then_some(n + 1)
            })
            .ok()
            .map(|_| WorkerSlot {
                active: Arc::clone(&self.active),
            })
    }
}

/// A claimed worker slot. Dropping it decrements the active count.
pub struct WorkerSlot {
    active: Arc<AtomicUsize>,
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Grows the worker pool while orders are waiting in the queue.
///
/// At most one worker is spawned per check. Shrinking is left to the workers
/// themselves, which retire after sitting idle.
pub struct Autoscaler {
    ctx: WorkerContext,
    workers: WorkerCounter,
    max_workers: usize,
    scale_interval: Duration,
    tracker: TaskTracker,
    cancel: CancellationToken,
    spawned: u64,
}

impl Autoscaler {
    pub fn new(
        ctx: WorkerContext,
        workers: WorkerCounter,
        max_workers: usize,
        scale_interval: Duration,
        tracker: TaskTracker,
    ) -> Self {
        let cancel = ctx.cancel.clone();
        Self {
            ctx,
            workers,
            max_workers,
            scale_interval,
            tracker,
            cancel,
            spawned: 0,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(max_workers = self.max_workers, "autoscaler started");

        let mut ticker = tokio::time::interval(self.scale_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.scale_once();
                }
            }
        }

        // Spawned workers observe the same token; they are joined by the tracker, not here.
        tracing::info!(
            spawned = self.spawned,
            active = self.workers.active(),
            "autoscaler stopped"
        );
    }

    /// Spawns one worker if there is backlog and room under the ceiling.
    pub fn scale_once(&mut self) -> bool {
        let backlog = self.ctx.queue.depth();
        if backlog == 0 {
            return false;
        }

        let Some(slot) = self.workers.try_acquire(self.max_workers) else {
            tracing::trace!(backlog, active = self.workers.active(), "worker ceiling reached");
            return false;
        };

        self.spawned += 1;
        let id = self.spawned;
        let worker = ReconciliationWorker::new(id, self.ctx.clone(), slot);
        self.tracker.spawn(worker.run());

        tracing::info!(
            worker = id,
            active = self.workers.active(),
            backlog,
            "spawned reconciliation worker"
        );
        true
    }
}
