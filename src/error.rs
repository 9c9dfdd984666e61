use crate::domain::order::OrderNumber;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("No orders awaiting reconciliation")]
    OrdersInWorkEmpty,
    #[error("Work queue closed")]
    QueueClosed,
    #[error("Accrual oracle unreachable: {0}")]
    OracleUnavailable(#[from] reqwest::Error),
    #[error("Accrual oracle answered with status {0}")]
    OracleStatus(u16),
    #[error("Order {0} is not registered in the accrual oracle")]
    OrderNotRegistered(OrderNumber),
    #[error("Accrual oracle rate limit hit, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("Accrual oracle did not answer within {0:?}")]
    OracleTimeout(Duration),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDBError(#[from] rocksdb::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
