#![allow(dead_code)]

use accrual_reconciler::config::PipelineConfig;
use accrual_reconciler::domain::order::{OracleResult, OrderNumber, OrderStatus, PendingOrder};
use accrual_reconciler::domain::ports::{AccrualOracle, OrderStore};
use accrual_reconciler::error::{ReconcileError, Result};
use accrual_reconciler::infrastructure::in_memory::InMemoryOrderStore;
use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Pipeline settings with short timers, meant for paused-clock tests.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        max_workers: 3,
        work_queue_capacity: 8,
        result_channel_capacity: 16,
        batch_size: 10,
        poll_interval: Duration::from_millis(100),
        scale_interval: Duration::from_millis(10),
        flush_interval: Duration::from_millis(50),
        oracle_timeout: Duration::from_millis(200),
        flush_timeout: Duration::from_millis(500),
        worker_idle_timeout: Duration::from_secs(60),
    }
}

pub fn verdict(order: u64, status: OrderStatus, accrual: Decimal) -> OracleResult {
    OracleResult::new(order, status, accrual)
}

/// Oracle double answering from a fixed table.
///
/// Unknown orders are reported as not registered. Individual orders can be
/// made to stall on their first request, and a latency range adds jitter to
/// every call.
#[derive(Default)]
pub struct ScriptedOracle {
    answers: Mutex<HashMap<OrderNumber, OracleResult>>,
    stall_once: Mutex<HashMap<OrderNumber, Duration>>,
    calls: Mutex<Vec<OrderNumber>>,
    latency_ms: Option<(u64, u64)>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.latency_ms = Some((min_ms, max_ms));
        self
    }

    pub fn answer(self, order: u64, status: OrderStatus, accrual: Decimal) -> Self {
        self.set_answer(order, status, accrual);
        self
    }

    pub fn set_answer(&self, order: u64, status: OrderStatus, accrual: Decimal) {
        self.answers
            .lock()
            .unwrap()
            .insert(OrderNumber(order), verdict(order, status, accrual));
    }

    pub fn stall_first_call(self, order: u64, delay: Duration) -> Self {
        self.stall_once
            .lock()
            .unwrap()
            .insert(OrderNumber(order), delay);
        self
    }

    pub fn calls_for(&self, order: u64) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.value() == order)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of requests that were ever served concurrently.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::Acquire)
    }
}

#[async_trait]
impl AccrualOracle for ScriptedOracle {
    async fn request_status(&self, order: OrderNumber) -> Result<OracleResult> {
        self.calls.lock().unwrap().push(order);
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_flight.fetch_max(now, Ordering::AcqRel);

        let stall = self.stall_once.lock().unwrap().remove(&order);
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        if let Some((min, max)) = self.latency_ms {
            let ms = rand::thread_rng().gen_range(min..=max);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.answers
            .lock()
            .unwrap()
            .get(&order)
            .cloned()
            .ok_or(ReconcileError::OrderNotRegistered(order))
    }
}

/// In-memory store that records every batch write attempt.
#[derive(Clone, Default)]
pub struct RecordingStore {
    inner: InMemoryOrderStore,
    attempts: Arc<Mutex<Vec<Vec<OracleResult>>>>,
    completed: Arc<AtomicUsize>,
    polls: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
    write_delay: Option<Duration>,
}

impl RecordingStore {
    pub fn with_orders(orders: impl IntoIterator<Item = PendingOrder>) -> Self {
        Self {
            inner: InMemoryOrderStore::with_orders(orders),
            ..Default::default()
        }
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Makes the next `n` batch writes fail.
    pub fn failing_writes(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::Release);
        self
    }

    pub fn attempts(&self) -> Vec<Vec<OracleResult>> {
        self.attempts.lock().unwrap().clone()
    }

    /// Batch writes that have returned, successfully or not.
    pub fn completed_writes(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::Acquire)
    }

    pub async fn order(&self, number: u64) -> PendingOrder {
        self.inner
            .get(OrderNumber(number))
            .await
            .expect("order registered")
    }
}

#[async_trait]
impl OrderStore for RecordingStore {
    async fn orders_in_work(&self) -> Result<Vec<PendingOrder>> {
        self.polls.fetch_add(1, Ordering::AcqRel);
        self.inner.orders_in_work().await
    }

    async fn update_orders_batch(&self, updates: &[OracleResult]) -> Result<()> {
        self.attempts.lock().unwrap().push(updates.to_vec());
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        let fail = self
            .failures_left
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        let outcome = if fail {
            Err(ReconcileError::StorageError("injected write failure".to_string()))
        } else {
            self.inner.update_orders_batch(updates).await
        };

        self.completed.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    async fn register_order(&self, order: PendingOrder) -> Result<()> {
        self.inner.register_order(order).await
    }

    async fn all_orders(&self) -> Result<Vec<PendingOrder>> {
        self.inner.all_orders().await
    }
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve_oracle(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock oracle");
    let addr = listener.local_addr().expect("mock oracle address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock oracle");
    });
    format!("http://{addr}")
}
