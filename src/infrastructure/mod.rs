//! Adapters behind the domain ports: order stores and the HTTP accrual oracle.

pub mod http_oracle;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
