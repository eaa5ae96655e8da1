//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigError;

/// Largest accepted `worker_count`.
pub const MAX_WORKERS: usize = 1024;

/// Largest accepted `queue_capacity`.
pub const MAX_QUEUE_CAPACITY: usize = 65_536;

/// Converter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Number of grouping workers. Unset means one per available CPU.
    #[serde(default)]
    pub worker_count: Option<usize>,

    /// Capacity of the input and output queues, in batches.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How often accumulated groups are flushed, in milliseconds.
    /// 0 flushes after every input batch.
    #[serde(default)]
    pub flush_interval_ms: u64,

    /// Accumulated resource groups that force a flush regardless of interval.
    #[serde(default = "default_max_groups")]
    pub max_groups: usize,

    #[serde(skip)]
    sub_millisecond_interval: Option<Duration>,
}

fn default_queue_capacity() -> usize {
    16
}

fn default_max_groups() -> usize {
    1000
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            queue_capacity: default_queue_capacity(),
            flush_interval_ms: 0,
            max_groups: default_max_groups(),
            sub_millisecond_interval: None,
        }
    }
}

impl ConverterConfig {
    /// Sets the worker count.
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    /// Sets the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the accumulation flush interval. Non-zero intervals below one
    /// millisecond fail `validate`.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.sub_millisecond_interval =
            (!interval.is_zero() && self.flush_interval_ms == 0).then_some(interval);
        self
    }

    /// Sets the group cap.
    pub fn with_max_groups(mut self, max: usize) -> Self {
        self.max_groups = max;
        self
    }

    /// Worker count to run with.
    pub fn effective_worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(MAX_WORKERS)
        })
    }

    /// The accumulation interval, if groups are held across batches.
    pub fn flush_interval(&self) -> Option<Duration> {
        (self.flush_interval_ms > 0).then(|| Duration::from_millis(self.flush_interval_ms))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == Some(0) {
            return Err(ConfigError::ValidationError(
                "converter.worker_count must be positive".to_string(),
            ));
        }
        if self.worker_count.is_some_and(|n| n > MAX_WORKERS) {
            return Err(ConfigError::ValidationError(format!(
                "converter.worker_count cannot exceed {}",
                MAX_WORKERS
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "converter.queue_capacity cannot be 0".to_string(),
            ));
        }
        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::ValidationError(format!(
                "converter.queue_capacity cannot exceed {}",
                MAX_QUEUE_CAPACITY
            )));
        }
        if let Some(interval) = self.sub_millisecond_interval {
            return Err(ConfigError::ValidationError(format!(
                "converter flush interval {:?} is below the 1ms resolution",
                interval
            )));
        }
        if self.max_groups == 0 {
            return Err(ConfigError::ValidationError(
                "converter.max_groups cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}
