use crate::error::{ReconcileError, Result};
use std::time::Duration;

/// Tuning knobs of the reconciliation pipeline, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Ceiling on concurrently running reconciliation workers.
    pub max_workers: usize,
    /// Capacity of the queue between the feed and the workers.
    pub work_queue_capacity: usize,
    /// Capacity of the channel between the workers and the aggregator.
    pub result_channel_capacity: usize,
    /// Buffer length that triggers an asynchronous flush.
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub scale_interval: Duration,
    pub flush_interval: Duration,
    /// Upper bound for a single oracle round-trip.
    pub oracle_timeout: Duration,
    /// Upper bound for size- and tick-triggered flushes. The final drain is unbounded.
    pub flush_timeout: Duration,
    /// A worker that receives nothing for this long retires and frees its slot.
    pub worker_idle_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            work_queue_capacity: 3,
            result_channel_capacity: 20,
            batch_size: 10,
            poll_interval: Duration::from_millis(500),
            scale_interval: Duration::from_millis(500),
            flush_interval: Duration::from_millis(500),
            oracle_timeout: Duration::from_secs(3),
            flush_timeout: Duration::from_millis(500),
            worker_idle_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("max_workers", self.max_workers),
            ("work_queue_capacity", self.work_queue_capacity),
            ("result_channel_capacity", self.result_channel_capacity),
            ("batch_size", self.batch_size),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ReconcileError::ConfigError(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let durations = [
            ("poll_interval", self.poll_interval),
            ("scale_interval", self.scale_interval),
            ("flush_interval", self.flush_interval),
            ("oracle_timeout", self.oracle_timeout),
            ("flush_timeout", self.flush_timeout),
            ("worker_idle_timeout", self.worker_idle_timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(ReconcileError::ConfigError(format!(
                    "{name} must be a positive duration"
                )));
            }
        }

        Ok(())
    }
}
