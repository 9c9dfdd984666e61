use super::PipelineState;
use crate::config::PipelineConfig;
use crate::domain::order::OracleResult;
use crate::domain::ports::{OrderStore, SharedOrderStore};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// What caused a batch to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// The buffer reached the batch size; written in the background.
    Size,
    /// Periodic timer; written inline.
    Tick,
    /// Final write during shutdown; never truncated by a timeout.
    Drain,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushTrigger::Size => f.write_str("size"),
            FlushTrigger::Tick => f.write_str("tick"),
            FlushTrigger::Drain => f.write_str("drain"),
        }
    }
}

/// Results waiting for a batch write.
///
/// Every mutation happens under one lock, and the lock is never held across
/// a store call.
pub struct BatchBuffer {
    items: Mutex<Vec<OracleResult>>,
    batch_size: usize,
}

impl BatchBuffer {
    pub fn new(batch_size: usize) -> Self {
        Self {
            items: Mutex::new(Vec::with_capacity(batch_size)),
            batch_size,
        }
    }

    /// Appends a result. Returns the full batch, leaving the buffer empty,
    /// once the batch size is reached.
    pub async fn push(&self, result: OracleResult) -> Option<Vec<OracleResult>> {
        let mut items = self.items.lock().await;
        items.push(result);
        if items.len() >= self.batch_size {
            Some(std::mem::replace(
                &mut *items,
                Vec::with_capacity(self.batch_size),
            ))
        } else {
            None
        }
    }

    /// Appends without ever cutting a batch.
    pub async fn append(&self, result: OracleResult) {
        self.items.lock().await.push(result);
    }

    /// Empties the buffer and returns what it held.
    pub async fn take(&self) -> Vec<OracleResult> {
        std::mem::take(&mut *self.items.lock().await)
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    #[cfg(test)]
    async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

/// Writes one batch. Failures and timeouts are logged and the batch is
/// dropped; the feed re-detects the divergence on a later poll.
pub async fn flush_batch(
    store: &dyn OrderStore,
    batch: Vec<OracleResult>,
    limit: Option<Duration>,
    trigger: FlushTrigger,
) -> bool {
    let batch_size = batch.len();
    let write = store.update_orders_batch(&batch);
    let outcome = match limit {
        Some(limit) => match tokio::time::timeout(limit, write).await {
            Ok(res) => res,
            Err(_) => {
                tracing::error!(
                    %trigger,
                    batch_size,
                    ?limit,
                    "batch write timed out, dropping batch"
                );
                return false;
            }
        },
        None => write.await,
    };

    match outcome {
        Ok(()) => {
            tracing::info!(%trigger, batch_size, "batch processed successfully");
            true
        }
        Err(e) => {
            tracing::error!(
                %trigger,
                batch_size,
                error = %e,
                "batch processing failed, dropping batch"
            );
            false
        }
    }
}

/// Single consumer of worker results, batching them into store writes.
pub struct BatchAggregator {
    store: SharedOrderStore,
    results: mpsc::Receiver<OracleResult>,
    buffer: BatchBuffer,
    flush_interval: Duration,
    flush_timeout: Duration,
    tracker: TaskTracker,
    cancel: CancellationToken,
    state: Arc<watch::Sender<PipelineState>>,
}

impl BatchAggregator {
    pub fn new(
        store: SharedOrderStore,
        results: mpsc::Receiver<OracleResult>,
        config: &PipelineConfig,
        tracker: TaskTracker,
        cancel: CancellationToken,
        state: Arc<watch::Sender<PipelineState>>,
    ) -> Self {
        Self {
            store,
            results,
            buffer: BatchBuffer::new(config.batch_size),
            flush_interval: config.flush_interval,
            flush_timeout: config.flush_timeout,
            tracker,
            cancel,
            state,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            batch_size = self.buffer.batch_size,
            interval = ?self.flush_interval,
            "batch aggregator started"
        );

        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut producers_gone = false;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.flush_on_tick().await,
                next = self.results.recv(), if !producers_gone => match next {
                    Some(result) => self.accept(result).await,
                    None => {
                        tracing::debug!("all result producers gone, waiting for shutdown");
                        producers_gone = true;
                    }
                },
            }
        }

        self.drain().await;
    }

    async fn accept(&self, result: OracleResult) {
        if let Some(batch) = self.buffer.push(result).await {
            let store = Arc::clone(&self.store);
            let limit = self.flush_timeout;
            self.tracker.spawn(async move {
                flush_batch(store.as_ref(), batch, Some(limit), FlushTrigger::Size).await;
            });
        }
    }

    async fn flush_on_tick(&self) {
        let batch = self.buffer.take().await;
        if batch.is_empty() {
            return;
        }
        flush_batch(
            self.store.as_ref(),
            batch,
            Some(self.flush_timeout),
            FlushTrigger::Tick,
        )
        .await;
    }

    /// Collects everything still in flight and writes it in one unbounded flush.
    async fn drain(&mut self) {
        // Cancellation may come from a parent token rather than `shutdown`.
        let cancelling = self.state.send_if_modified(|state| {
            if *state == PipelineState::Running {
                *state = PipelineState::Cancelling;
                true
            } else {
                false
            }
        });
        if cancelling {
            // Let subscribers see the cancellation before draining starts.
            tokio::task::yield_now().await;
        }
        self.state.send_replace(PipelineState::Draining);

        // Refuse new results, then take whatever the workers already handed over.
        self.results.close();
        while let Some(result) = self.results.recv().await {
            self.buffer.append(result).await;
        }

        let batch = self.buffer.take().await;
        tracing::info!(batch_size = batch.len(), "flushing buffer on shutdown");
        if !batch.is_empty() {
            flush_batch(self.store.as_ref(), batch, None, FlushTrigger::Drain).await;
        }
        tracing::info!("batch aggregator stopped");
    }
}
