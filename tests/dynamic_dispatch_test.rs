use accrual_reconciler::domain::order::{OrderNumber, OrderStatus, PendingOrder};
use accrual_reconciler::domain::ports::{
    AccrualOracle, OrderStoreBox, SharedAccrualOracle, SharedOrderStore,
};
use accrual_reconciler::infrastructure::in_memory::InMemoryOrderStore;
use common::ScriptedOracle;
use rust_decimal_macros::dec;
use std::sync::Arc;

mod common;

#[tokio::test]
async fn test_stores_as_trait_objects() {
    let order_store: OrderStoreBox = Box::new(InMemoryOrderStore::new());
    let oracle: SharedAccrualOracle = Arc::new(
        ScriptedOracle::new().answer(1, OrderStatus::Processed, dec!(100.0)),
    );

    // Verify Send + Sync by spawning tasks
    let store_handle = tokio::spawn(async move {
        order_store
            .register_order(PendingOrder::new(1u64, 1))
            .await
            .unwrap();
        order_store.orders_in_work().await.unwrap()
    });

    let oracle_handle = tokio::spawn({
        let oracle = Arc::clone(&oracle);
        async move { oracle.request_status(OrderNumber(1)).await.unwrap() }
    });

    let in_work = store_handle.await.unwrap();
    assert_eq!(in_work.len(), 1);
    assert_eq!(in_work[0].number, OrderNumber(1));

    let verdict = oracle_handle.await.unwrap();
    assert!(verdict.differs_from(&in_work[0]));
}

#[tokio::test]
async fn test_shared_store_sees_updates_across_tasks() {
    let store: SharedOrderStore = Arc::new(InMemoryOrderStore::with_orders([
        PendingOrder::new(1u64, 1),
        PendingOrder::new(2u64, 1),
    ]));

    let writer = tokio::spawn({
        let store = Arc::clone(&store);
        async move {
            let oracle = ScriptedOracle::new().answer(2, OrderStatus::Invalid, dec!(0));
            let verdict = oracle.request_status(OrderNumber(2)).await.unwrap();
            store.update_orders_batch(&[verdict]).await.unwrap();
        }
    });
    writer.await.unwrap();

    let in_work = store.orders_in_work().await.unwrap();
    assert_eq!(in_work.len(), 1);
    assert_eq!(in_work[0].number, OrderNumber(1));

    let all = store.all_orders().await.unwrap();
    assert_eq!(all.len(), 2);
}
