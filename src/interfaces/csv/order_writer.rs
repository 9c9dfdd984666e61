use crate::domain::order::PendingOrder;
use crate::error::Result;
use std::io::Write;

/// Writes order states as CSV with the header `order,status,accrual,user_id`.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_orders(&mut self, orders: impl IntoIterator<Item = PendingOrder>) -> Result<()> {
        for order in orders {
            self.writer.serialize(order)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use rust_decimal_macros::dec;

    #[test]
    fn test_writer_output_format() {
        let mut out = Vec::new();
        let orders = vec![
            PendingOrder::new(12345678903u64, 1)
                .with_status(OrderStatus::Processed, dec!(729.98)),
            PendingOrder::new(79927398713u64, 2),
        ];

        OrderWriter::new(&mut out).write_orders(orders).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "order,status,accrual,user_id");
        assert_eq!(lines[1], "12345678903,PROCESSED,729.98,1");
        assert_eq!(lines[2], "79927398713,NEW,0,2");
    }
}
