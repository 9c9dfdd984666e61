use super::order::{OracleResult, OrderNumber, PendingOrder};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Durable home of orders, read by the feed and written by the aggregator.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Every order whose status is not final.
    ///
    /// Returns [`ReconcileError::OrdersInWorkEmpty`](crate::error::ReconcileError::OrdersInWorkEmpty)
    /// when nothing is pending, so callers can tell "idle" apart from a failed fetch.
    async fn orders_in_work(&self) -> Result<Vec<PendingOrder>>;

    /// Applies all updates keyed by order number in one all-or-nothing write.
    /// Updates for unknown orders are ignored.
    async fn update_orders_batch(&self, updates: &[OracleResult]) -> Result<()>;

    /// Inserts or replaces an order snapshot.
    async fn register_order(&self, order: PendingOrder) -> Result<()>;

    /// Every stored order, ordered by number.
    async fn all_orders(&self) -> Result<Vec<PendingOrder>>;
}

/// External service issuing the credit verdict for an order.
#[async_trait]
pub trait AccrualOracle: Send + Sync {
    async fn request_status(&self, order: OrderNumber) -> Result<OracleResult>;
}

pub type OrderStoreBox = Box<dyn OrderStore>;
pub type SharedOrderStore = Arc<dyn OrderStore>;
pub type SharedAccrualOracle = Arc<dyn AccrualOracle>;
