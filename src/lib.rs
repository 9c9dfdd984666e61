//! Background reconciliation of order accruals.
//!
//! Orders that still await a credit decision are polled from an
//! [`domain::ports::OrderStore`], checked against an external
//! [`domain::ports::AccrualOracle`], and any changed verdicts are written back
//! in keyed batches. See [`application`] for the pipeline itself.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
