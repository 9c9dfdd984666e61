use crate::domain::order::PendingOrder;
use crate::error::{ReconcileError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};

/// Creates the bounded feed → workers queue.
///
/// The sender half is unique and not clonable, so exactly one owner can close
/// the queue. The receiver half is shared by every worker.
pub fn work_queue(capacity: usize) -> (WorkQueueSender, WorkQueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let depth = Arc::new(AtomicUsize::new(0));
    (
        WorkQueueSender {
            tx,
            depth: Arc::clone(&depth),
        },
        WorkQueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
            depth,
        },
    )
}

/// Producer side of the work queue, owned by the feed.
pub struct WorkQueueSender {
    tx: mpsc::Sender<PendingOrder>,
    depth: Arc<AtomicUsize>,
}

impl WorkQueueSender {
    /// Waits for room in the queue, then enqueues the order.
    ///
    /// Fails only when every receiver is gone.
    pub async fn push(&self, order: PendingOrder) -> Result<()> {
        let permit = self
            .tx
            .reserve()
            .await
            .map_err(|_| ReconcileError::QueueClosed)?;
        // Counted before the send so a consumer can never decrement first.
        self.depth.fetch_add(1, Ordering::AcqRel);
        permit.send(order);
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Closes the queue. Consumers drain what is left and then see end-of-stream.
    pub fn close(self) {
        drop(self.tx);
    }
}

/// Consumer side of the work queue, shared by all workers.
#[derive(Clone)]
pub struct WorkQueueReceiver {
    rx: Arc<Mutex<mpsc::Receiver<PendingOrder>>>,
    depth: Arc<AtomicUsize>,
}

impl WorkQueueReceiver {
    /// Next queued order, or `None` once the queue is closed and drained.
    ///
    /// Cancel safe: dropping the future never loses an order.
    pub async fn pop(&self) -> Option<PendingOrder> {
        let mut rx = self.rx.lock().await;
        let order = rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(order)
    }

    /// Number of orders waiting to be picked up.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}
