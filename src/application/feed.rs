use super::queue::WorkQueueSender;
use crate::domain::ports::SharedOrderStore;
use crate::error::ReconcileError;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Polls the store for unfinished orders and feeds them to the workers.
///
/// The feed is the sole owner of the queue's sender and closes it when it
/// stops, which is how workers learn that no more work is coming.
pub struct PendingOrderFeed {
    store: SharedOrderStore,
    queue: WorkQueueSender,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl PendingOrderFeed {
    pub fn new(
        store: SharedOrderStore,
        queue: WorkQueueSender,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            queue,
            poll_interval,
            cancel,
        }
    }

    pub async fn run(self) {
        tracing::info!(interval = ?self.poll_interval, "pending order feed started");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }

        self.queue.close();
        tracing::info!("pending order feed stopped, work queue closed");
    }

    /// One polling cycle. Returns the number of orders enqueued.
    pub async fn poll_once(&self) -> usize {
        let orders = match self.store.orders_in_work().await {
            Ok(orders) => orders,
            Err(ReconcileError::OrdersInWorkEmpty) => {
                tracing::debug!("no orders awaiting reconciliation");
                return 0;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch orders in work");
                return 0;
            }
        };

        let total = orders.len();
        let mut pushed = 0;
        for order in orders {
            let number = order.number;
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(pushed, total, "feed cancelled mid-cycle");
                    break;
                }
                res = self.queue.push(order) => match res {
                    Ok(()) => pushed += 1,
                    Err(e) => {
                        tracing::warn!(order = %number, error = %e, "dropping poll cycle");
                        break;
                    }
                },
            }
        }

        tracing::debug!(pushed, total, backlog = self.queue.depth(), "poll cycle finished");
        pushed
    }
}
