use crate::domain::order::PendingOrder;
use crate::error::{ReconcileError, Result};
use std::io::Read;

/// Reads order snapshots from a CSV source with the header
/// `order,status,accrual,user_id`.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<PendingOrder>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct OrderReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OrderReader<R> {
    /// Creates a new `OrderReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes orders.
    pub fn orders(self) -> impl Iterator<Item = Result<PendingOrder>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(ReconcileError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderNumber, OrderStatus};
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "order, status, accrual, user_id\n12345678903, NEW, 0, 1\n79927398713, PROCESSING, 12.5, 2";
        let reader = OrderReader::new(data.as_bytes());
        let results: Vec<Result<PendingOrder>> = reader.orders().collect();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.number, OrderNumber(12345678903));
        assert_eq!(first.status, OrderStatus::New);

        let second = results[1].as_ref().unwrap();
        assert_eq!(second.status, OrderStatus::Processing);
        assert_eq!(second.accrual, dec!(12.5));
        assert_eq!(second.user_id, 2);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "order, status, accrual, user_id\n1, LOST, 0, 1\n2, NEW, 0, 1";
        let reader = OrderReader::new(data.as_bytes());
        let results: Vec<Result<PendingOrder>> = reader.orders().collect();

        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }
}
