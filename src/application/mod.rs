//! Application layer containing the reconciliation pipeline.
//!
//! A [`feed::PendingOrderFeed`] polls the store and fills a bounded work
//! queue, an [`autoscaler::Autoscaler`] grows a pool of
//! [`worker::ReconciliationWorker`]s while backlog persists, and a single
//! [`aggregator::BatchAggregator`] turns their results into batched store
//! writes. Components only talk through bounded channels and share one
//! cancellation token; [`pipeline::ReconciliationPipeline`] wires them up.

pub mod aggregator;
pub mod autoscaler;
pub mod feed;
pub mod pipeline;
pub mod queue;
pub mod worker;

/// Lifecycle of a running pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    /// Shutdown requested; loops are winding down.
    Cancelling,
    /// The aggregator is writing its final batch.
    Draining,
    /// Every tracked task has finished.
    Stopped,
}
