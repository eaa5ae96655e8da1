//! Types for the emitter module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// What closed a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushTrigger {
    /// The batch reached the configured size.
    Size,
    /// The flush interval elapsed.
    Interval,
    /// The emitter was stopped.
    Stop,
}

impl FlushTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Interval => "interval",
            Self::Stop => "stop",
        }
    }
}

/// Records closed together by one flush, in acceptance order.
#[derive(Debug, Clone)]
pub struct Batch {
    records: Vec<Record>,
    closed_at: DateTime<Utc>,
    trigger: FlushTrigger,
}

impl Batch {
    /// Closes a batch now.
    pub fn new(records: Vec<Record>, trigger: FlushTrigger) -> Self {
        Self {
            records,
            closed_at: Utc::now(),
            trigger,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn closed_at(&self) -> DateTime<Utc> {
        self.closed_at
    }

    pub fn trigger(&self) -> FlushTrigger {
        self.trigger
    }
}
