//! Types for the converter module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{Attributes, Record, ResourceFingerprint};

/// Records sharing one resource identity, in acceptance order.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceGroup {
    fingerprint: ResourceFingerprint,
    resource: Attributes,
    records: Vec<Record>,
}

impl ResourceGroup {
    /// Starts a group from its first record, capturing the resource mapping.
    pub(crate) fn new(fingerprint: ResourceFingerprint, first: Record) -> Self {
        Self {
            fingerprint,
            resource: first.resource().clone(),
            records: vec![first],
        }
    }

    pub(crate) fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub(crate) fn append(&mut self, mut other: ResourceGroup) {
        self.records.append(&mut other.records);
    }

    pub fn fingerprint(&self) -> ResourceFingerprint {
        self.fingerprint
    }

    pub fn resource(&self) -> &Attributes {
        &self.resource
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
}

/// Why the accumulator flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    /// One input batch was merged (no accumulation interval configured).
    Batch,
    /// The accumulation interval elapsed.
    Interval,
    /// The accumulated group count reached `max_groups`.
    GroupCap,
    /// The converter is stopping.
    Drain,
}

impl FlushReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Interval => "interval",
            Self::GroupCap => "group_cap",
            Self::Drain => "drain",
        }
    }
}

/// Resource groups handed to the consumer in a single delivery call.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryBatch {
    id: Uuid,
    created_at: DateTime<Utc>,
    reason: FlushReason,
    groups: Vec<ResourceGroup>,
}

impl DeliveryBatch {
    pub fn new(groups: Vec<ResourceGroup>, reason: FlushReason) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            reason,
            groups,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn reason(&self) -> FlushReason {
        self.reason
    }

    pub fn groups(&self) -> &[ResourceGroup] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<ResourceGroup> {
        self.groups
    }

    /// Total records across all groups.
    pub fn record_count(&self) -> usize {
        self.groups.iter().map(ResourceGroup::len).sum()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Finds the group for a resource, if present.
    pub fn group(&self, fingerprint: &ResourceFingerprint) -> Option<&ResourceGroup> {
        self.groups.iter().find(|g| &g.fingerprint == fingerprint)
    }
}

/// Snapshot of converter activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConverterStatus {
    /// Whether the worker pool is running.
    pub running: bool,
    /// Number of grouping workers.
    pub worker_count: usize,
    /// Batches accepted through `batch`.
    pub batches_received: u64,
    /// Records placed into a resource group.
    pub records_converted: u64,
    /// Records dropped (malformed, or refused after stop).
    pub records_dropped: u64,
    /// Delivery batches pushed to the output queue.
    pub delivery_batches: u64,
}
