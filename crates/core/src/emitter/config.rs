//! Configuration for the emitter module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigError;

/// Largest accepted `max_batch_size`.
pub const MAX_BATCH_SIZE: usize = 1_000_000;

/// Largest accepted `queue_capacity`.
pub const MAX_QUEUE_CAPACITY: usize = 65_536;

/// Configuration for the log emitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    /// Records per batch before a size-triggered flush (0 = size trigger off).
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Interval between time-triggered flushes in milliseconds (0 = timer off).
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    /// Closed batches the output queue holds before `accept` waits.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// A non-zero interval shorter than a millisecond passed to
    /// `with_flush_interval`. Kept so `validate` can reject it.
    #[serde(skip)]
    sub_millisecond_interval: Option<Duration>,
}

fn default_max_batch_size() -> usize {
    100
}

fn default_flush_interval() -> u64 {
    100
}

fn default_queue_capacity() -> usize {
    8
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            flush_interval_ms: default_flush_interval(),
            queue_capacity: default_queue_capacity(),
            sub_millisecond_interval: None,
        }
    }
}

impl EmitterConfig {
    /// Sets the maximum batch size.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Sets the flush interval. Non-zero intervals below one millisecond
    /// fail `validate` instead of turning the timer off.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.sub_millisecond_interval =
            (!interval.is_zero() && self.flush_interval_ms == 0).then_some(interval);
        self
    }

    /// Sets the output queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// The flush interval, if the time trigger is enabled.
    pub fn flush_interval(&self) -> Option<Duration> {
        (self.flush_interval_ms > 0).then(|| Duration::from_millis(self.flush_interval_ms))
    }

    /// The size threshold, if the size trigger is enabled.
    pub fn size_threshold(&self) -> Option<usize> {
        (self.max_batch_size > 0).then_some(self.max_batch_size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(interval) = self.sub_millisecond_interval {
            return Err(ConfigError::ValidationError(format!(
                "emitter flush interval {:?} is below the 1ms resolution",
                interval
            )));
        }
        if self.max_batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "emitter.max_batch_size cannot exceed {}",
                MAX_BATCH_SIZE
            )));
        }
        if self.size_threshold().is_none() && self.flush_interval().is_none() {
            return Err(ConfigError::ValidationError(
                "emitter needs max_batch_size or flush_interval_ms to be non-zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "emitter.queue_capacity cannot be 0".to_string(),
            ));
        }
        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::ValidationError(format!(
                "emitter.queue_capacity cannot exceed {}",
                MAX_QUEUE_CAPACITY
            )));
        }
        Ok(())
    }
}
