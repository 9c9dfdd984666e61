use super::PipelineState;
use super::aggregator::BatchAggregator;
use super::autoscaler::{Autoscaler, WorkerCounter};
use super::feed::PendingOrderFeed;
use super::queue::{WorkQueueReceiver, work_queue};
use super::worker::WorkerContext;
use crate::config::PipelineConfig;
use crate::domain::ports::{SharedAccrualOracle, SharedOrderStore};
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Entry point wiring feed, autoscaler, workers and aggregator together.
pub struct ReconciliationPipeline;

impl ReconciliationPipeline {
    /// Spawns the pipeline on the current tokio runtime.
    pub fn start(
        config: PipelineConfig,
        store: SharedOrderStore,
        oracle: SharedAccrualOracle,
    ) -> Result<PipelineHandle> {
        Self::start_with_cancellation(config, store, oracle, CancellationToken::new())
    }

    /// Like [`ReconciliationPipeline::start`], stopping when `cancel` fires.
    ///
    /// Pass a child token to tie the pipeline to a wider shutdown.
    pub fn start_with_cancellation(
        config: PipelineConfig,
        store: SharedOrderStore,
        oracle: SharedAccrualOracle,
        cancel: CancellationToken,
    ) -> Result<PipelineHandle> {
        config.validate()?;

        let tracker = TaskTracker::new();
        let state = Arc::new(watch::Sender::new(PipelineState::Running));
        let (queue_tx, queue_rx) = work_queue(config.work_queue_capacity);
        let (results_tx, results_rx) = mpsc::channel(config.result_channel_capacity);
        let workers = WorkerCounter::default();

        let ctx = WorkerContext {
            queue: queue_rx.clone(),
            oracle,
            results: results_tx,
            oracle_timeout: config.oracle_timeout,
            idle_timeout: config.worker_idle_timeout,
            cancel: cancel.clone(),
        };

        let feed = PendingOrderFeed::new(
            Arc::clone(&store),
            queue_tx,
            config.poll_interval,
            cancel.clone(),
        );
        let autoscaler = Autoscaler::new(
            ctx,
            workers.clone(),
            config.max_workers,
            config.scale_interval,
            tracker.clone(),
        );
        let aggregator = BatchAggregator::new(
            store,
            results_rx,
            &config,
            tracker.clone(),
            cancel.clone(),
            Arc::clone(&state),
        );

        tracker.spawn(feed.run());
        tracker.spawn(autoscaler.run());
        tracker.spawn(aggregator.run());
        // Workers and async flushes are still spawned on the tracker later;
        // closing only lets `wait` complete once all of them are done.
        tracker.close();

        // Untracked: `Stopped` must be published even if the handle is dropped.
        tokio::spawn({
            let tracker = tracker.clone();
            let state = Arc::clone(&state);
            async move {
                tracker.wait().await;
                state.send_replace(PipelineState::Stopped);
            }
        });

        tracing::info!(?config, "reconciliation pipeline started");

        Ok(PipelineHandle {
            cancel,
            tracker,
            state,
            workers,
            queue: queue_rx,
        })
    }
}

/// Control surface of a running pipeline.
///
/// Dropping the handle does not stop the pipeline; call
/// [`PipelineHandle::shutdown`] or cancel the token it was started with.
/// The state still reaches [`PipelineState::Stopped`] once every task is
/// done, whether or not anyone joins, so subscribers taken before the drop
/// see the whole lifecycle. The handle stays usable after shutdown for
/// inspecting the final state.
pub struct PipelineHandle {
    cancel: CancellationToken,
    tracker: TaskTracker,
    state: Arc<watch::Sender<PipelineState>>,
    workers: WorkerCounter,
    queue: WorkQueueReceiver,
}

impl PipelineHandle {
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn active_workers(&self) -> usize {
        self.workers.active()
    }

    /// Orders waiting in the work queue.
    pub fn backlog(&self) -> usize {
        self.queue.depth()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signals every loop to stop, then waits for the final drain and all tasks.
    pub async fn shutdown(&self) {
        tracing::info!("initiating reconciliation pipeline shutdown");
        self.state.send_if_modified(|state| {
            if *state == PipelineState::Running {
                *state = PipelineState::Cancelling;
                true
            } else {
                false
            }
        });
        self.cancel.cancel();
        self.join().await;
    }

    /// Waits until the pipeline has stopped on its own cancellation.
    ///
    /// Covers the feed, the aggregator, the autoscaler, every worker it
    /// spawned and every background flush.
    pub async fn join(&self) {
        self.tracker.wait().await;
        self.state.send_replace(PipelineState::Stopped);
        tracing::info!("reconciliation pipeline stopped");
    }
}
