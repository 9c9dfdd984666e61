use crate::domain::order::{OracleResult, OrderNumber, PendingOrder};
use crate::domain::ports::OrderStore;
use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory order store.
///
/// Uses `Arc<RwLock<BTreeMap<OrderNumber, PendingOrder>>>` to allow shared concurrent access.
/// Ideal for testing or ephemeral runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<BTreeMap<OrderNumber, PendingOrder>>>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given orders.
    pub fn with_orders(orders: impl IntoIterator<Item = PendingOrder>) -> Self {
        let map = orders.into_iter().map(|o| (o.number, o)).collect();
        Self {
            orders: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn get(&self, number: OrderNumber) -> Option<PendingOrder> {
        self.orders.read().await.get(&number).cloned()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn orders_in_work(&self) -> Result<Vec<PendingOrder>> {
        let orders = self.orders.read().await;
        let pending: Vec<PendingOrder> = orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect();

        if pending.is_empty() {
            return Err(ReconcileError::OrdersInWorkEmpty);
        }
        Ok(pending)
    }

    async fn update_orders_batch(&self, updates: &[OracleResult]) -> Result<()> {
        // Single write guard: readers observe the whole batch or none of it.
        let mut orders = self.orders.write().await;
        for update in updates {
            if let Some(order) = orders.get_mut(&update.order) {
                order.apply(update);
            }
        }
        Ok(())
    }

    async fn register_order(&self, order: PendingOrder) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.insert(order.number, order);
        Ok(())
    }

    async fn all_orders(&self) -> Result<Vec<PendingOrder>> {
        let orders = self.orders.read().await;
        Ok(orders.values().cloned().collect())
    }
}
