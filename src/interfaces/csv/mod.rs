pub mod order_reader;
pub mod order_writer;

pub use order_reader::OrderReader;
pub use order_writer::OrderWriter;
