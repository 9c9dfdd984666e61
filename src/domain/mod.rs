//! Domain layer: order snapshots, oracle verdicts and the ports the
//! reconciliation pipeline talks through.

pub mod order;
pub mod ports;
