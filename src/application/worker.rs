use super::autoscaler::WorkerSlot;
use super::queue::WorkQueueReceiver;
use crate::domain::order::{OracleResult, PendingOrder};
use crate::domain::ports::SharedAccrualOracle;
use crate::error::ReconcileError;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything a worker needs, cloned once per spawned worker.
#[derive(Clone)]
pub struct WorkerContext {
    pub queue: WorkQueueReceiver,
    pub oracle: SharedAccrualOracle,
    pub results: mpsc::Sender<OracleResult>,
    pub oracle_timeout: Duration,
    pub idle_timeout: Duration,
    pub cancel: CancellationToken,
}

/// Why a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The feed closed the queue and nothing was left in it.
    QueueClosed,
    Cancelled,
    /// No order arrived within the idle timeout.
    Idle,
    /// The aggregator stopped accepting results.
    ResultsClosed,
}

/// Outcome of reconciling a single order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The oracle verdict differs from storage and was handed to the aggregator.
    Published,
    Unchanged,
    /// Oracle failure or timeout; the next poll cycle will bring the order back.
    Skipped,
}

pub struct ReconciliationWorker {
    id: u64,
    ctx: WorkerContext,
    // Released on drop, whichever way the worker exits.
    _slot: WorkerSlot,
}

impl ReconciliationWorker {
    pub fn new(id: u64, ctx: WorkerContext, slot: WorkerSlot) -> Self {
        Self {
            id,
            ctx,
            _slot: slot,
        }
    }

    pub async fn run(self) -> WorkerExit {
        tracing::info!(worker = self.id, "reconciliation worker started");
        let exit = self.work().await;
        tracing::info!(worker = self.id, reason = ?exit, "reconciliation worker stopped");
        exit
    }

    async fn work(&self) -> WorkerExit {
        loop {
            let idle = tokio::time::timeout(self.ctx.idle_timeout, self.ctx.queue.pop());
            let order = tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => return WorkerExit::Cancelled,
                next = idle => match next {
                    Err(_) => return WorkerExit::Idle,
                    Ok(None) => return WorkerExit::QueueClosed,
                    Ok(Some(order)) => order,
                },
            };

            if let Err(exit) = self.reconcile(&order).await {
                return exit;
            }
        }
    }

    /// Asks the oracle about one order and publishes the verdict if it changed anything.
    pub async fn reconcile(&self, order: &PendingOrder) -> Result<Reconciled, WorkerExit> {
        let ctx = &self.ctx;
        let request = ctx.oracle.request_status(order.number);
        let request = tokio::time::timeout(ctx.oracle_timeout, request);
        let verdict = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(WorkerExit::Cancelled),
            res = request => {
                res.unwrap_or(Err(ReconcileError::OracleTimeout(ctx.oracle_timeout)))
            }
        };

        let result = match verdict {
            Ok(result) => result,
            Err(ReconcileError::RateLimited { retry_after }) => {
                tracing::warn!(
                    worker = self.id,
                    order = %order.number,
                    ?retry_after,
                    "accrual oracle throttled, pausing"
                );
                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => return Err(WorkerExit::Cancelled),
                    _ = tokio::time::sleep(retry_after) => {}
                }
                return Ok(Reconciled::Skipped);
            }
            Err(e @ ReconcileError::OrderNotRegistered(_)) => {
                tracing::debug!(worker = self.id, error = %e, "order unknown to the oracle yet");
                return Ok(Reconciled::Skipped);
            }
            Err(e) => {
                tracing::warn!(
                    worker = self.id,
                    order = %order.number,
                    error = %e,
                    "failed to request accrual status"
                );
                return Ok(Reconciled::Skipped);
            }
        };

        if !result.differs_from(order) {
            tracing::trace!(worker = self.id, order = %order.number, "oracle verdict unchanged");
            return Ok(Reconciled::Unchanged);
        }

        tracing::debug!(
            worker = self.id,
            order = %order.number,
            from = %order.status,
            to = %result.status,
            accrual = %result.accrual,
            "oracle verdict changed"
        );

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(WorkerExit::Cancelled),
            sent = ctx.results.send(result) => match sent {
                Ok(()) => Ok(Reconciled::Published),
                Err(_) => Err(WorkerExit::ResultsClosed),
            },
        }
    }
}
