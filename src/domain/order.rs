use crate::error::ReconcileError;
use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifier of an order as known to both the store and the accrual oracle.
///
/// The oracle transmits order numbers as decimal strings, while CSV files and
/// older payloads may carry plain integers; both forms are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderNumber(pub u64);

impl OrderNumber {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderNumber {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| {
                ReconcileError::ValidationError(format!("Invalid order number {s:?}: {e}"))
            })
    }
}

impl From<u64> for OrderNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Serialize for OrderNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

struct OrderNumberVisitor;

impl Visitor<'_> for OrderNumberVisitor {
    type Value = OrderNumber;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an order number as a string or a non-negative integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(OrderNumber(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(OrderNumber)
            .map_err(|_| E::custom(format!("negative order number {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for OrderNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(OrderNumberVisitor)
    }
}

/// Lifecycle of an order's credit decision.
///
/// `Invalid` and `Processed` are final; anything else is still "in work" and
/// gets polled against the oracle.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Uploaded but not evaluated yet. The oracle reports this as `REGISTERED`.
    #[serde(alias = "REGISTERED")]
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Invalid | OrderStatus::Processed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        };
        f.write_str(s)
    }
}

/// Snapshot of a stored order handed out by the store.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PendingOrder {
    #[serde(rename = "order")]
    pub number: OrderNumber,
    pub status: OrderStatus,
    pub accrual: Decimal,
    pub user_id: u64,
}

impl PendingOrder {
    pub fn new(number: impl Into<OrderNumber>, user_id: u64) -> Self {
        Self {
            number: number.into(),
            status: OrderStatus::New,
            accrual: Decimal::ZERO,
            user_id,
        }
    }

    pub fn with_status(mut self, status: OrderStatus, accrual: Decimal) -> Self {
        self.status = status;
        self.accrual = accrual;
        self
    }

    /// Overwrites status and accrual with the oracle's verdict.
    pub fn apply(&mut self, update: &OracleResult) {
        self.status = update.status;
        self.accrual = update.accrual;
    }
}

/// The oracle's current verdict for one order.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OracleResult {
    pub order: OrderNumber,
    pub status: OrderStatus,
    #[serde(default)]
    pub accrual: Decimal,
}

impl OracleResult {
    pub fn new(order: impl Into<OrderNumber>, status: OrderStatus, accrual: Decimal) -> Self {
        Self {
            order: order.into(),
            status,
            accrual,
        }
    }

    /// True when storage needs to learn about this verdict.
    pub fn differs_from(&self, snapshot: &PendingOrder) -> bool {
        self.status != snapshot.status || self.accrual != snapshot.accrual
    }

    /// Rejects payloads that answer for another order or carry a negative accrual.
    pub fn validate_for(self, requested: OrderNumber) -> Result<Self, ReconcileError> {
        if self.order != requested {
            return Err(ReconcileError::ValidationError(format!(
                "oracle answered for order {} while {} was requested",
                self.order, requested
            )));
        }
        if self.accrual < Decimal::ZERO {
            return Err(ReconcileError::ValidationError(format!(
                "negative accrual {} for order {}",
                self.accrual, self.order
            )));
        }
        Ok(self)
    }
}
