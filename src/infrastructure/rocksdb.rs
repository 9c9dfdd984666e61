use crate::domain::order::{OracleResult, PendingOrder};
use crate::domain::ports::OrderStore;
use crate::error::{ReconcileError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;

/// Column Family for storing order snapshots.
pub const CF_ORDERS: &str = "orders";

/// A persistent order store implementation using RocksDB.
///
/// Orders live in the `orders` column family, keyed by the big-endian order
/// number so iteration yields them in numeric order. Batch updates go through
/// a single `WriteBatch`, which makes every `update_orders_batch` call atomic.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBOrderStore {
    db: Arc<DB>,
}

impl RocksDBOrderStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the `orders` column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_orders])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn orders_cf(&self) -> Result<&ColumnFamily> {
        self.db.cf_handle(CF_ORDERS).ok_or_else(|| {
            ReconcileError::InternalError(Box::new(std::io::Error::other(
                "Orders column family not found",
            )))
        })
    }

    fn decode(bytes: &[u8]) -> Result<PendingOrder> {
        serde_json::from_slice(bytes).map_err(|e| {
            ReconcileError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Deserialization error: {}", e),
            )))
        })
    }

    fn encode(order: &PendingOrder) -> Result<Vec<u8>> {
        serde_json::to_vec(order).map_err(|e| {
            ReconcileError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )))
        })
    }

    fn scan(&self) -> Result<Vec<PendingOrder>> {
        let cf = self.orders_cf()?;
        let mut orders = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            orders.push(Self::decode(&value)?);
        }
        Ok(orders)
    }
}

#[async_trait]
impl OrderStore for RocksDBOrderStore {
    async fn orders_in_work(&self) -> Result<Vec<PendingOrder>> {
        let pending: Vec<PendingOrder> = self
            .scan()?
            .into_iter()
            .filter(|o| !o.status.is_terminal())
            .collect();

        if pending.is_empty() {
            return Err(ReconcileError::OrdersInWorkEmpty);
        }
        Ok(pending)
    }

    async fn update_orders_batch(&self, updates: &[OracleResult]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let cf = self.orders_cf()?;
        let mut batch = WriteBatch::default();
        for update in updates {
            let key = update.order.to_be_bytes();
            // UPDATE-by-key: orders the store never saw are skipped.
            let Some(bytes) = self.db.get_cf(cf, key)? else {
                continue;
            };
            let mut order = Self::decode(&bytes)?;
            order.apply(update);
            batch.put_cf(cf, key, Self::encode(&order)?);
        }

        self.db.write(batch)?;
        Ok(())
    }

    async fn register_order(&self, order: PendingOrder) -> Result<()> {
        let cf = self.orders_cf()?;
        let value = Self::encode(&order)?;
        self.db.put_cf(cf, order.number.to_be_bytes(), value)?;
        Ok(())
    }

    async fn all_orders(&self) -> Result<Vec<PendingOrder>> {
        self.scan()
    }
}
