//! Ordered grouping of records by resource fingerprint.

use std::collections::HashMap;

use crate::record::{Record, ResourceFingerprint};

use super::types::ResourceGroup;

/// Resource groups in first-seen order, with a fingerprint index.
#[derive(Debug, Default)]
pub(crate) struct GroupedRecords {
    index: HashMap<ResourceFingerprint, usize>,
    groups: Vec<ResourceGroup>,
    records: usize,
}

impl GroupedRecords {
    /// Adds a record to its group, creating the group on first sight.
    pub(crate) fn insert(&mut self, fingerprint: ResourceFingerprint, record: Record) {
        self.records += 1;
        match self.index.get(&fingerprint) {
            Some(&idx) => self.groups[idx].push(record),
            None => {
                self.index.insert(fingerprint, self.groups.len());
                self.groups.push(ResourceGroup::new(fingerprint, record));
            }
        }
    }

    /// Appends another grouping after this one's records.
    pub(crate) fn merge(&mut self, other: GroupedRecords) {
        self.records += other.records;
        for group in other.groups {
            let fingerprint = group.fingerprint();
            match self.index.get(&fingerprint) {
                Some(&idx) => self.groups[idx].append(group),
                None => {
                    self.index.insert(fingerprint, self.groups.len());
                    self.groups.push(group);
                }
            }
        }
    }

    /// Number of groups.
    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub(crate) fn record_count(&self) -> usize {
        self.records
    }

    /// Takes all groups out, leaving this grouping empty.
    pub(crate) fn take(&mut self) -> Vec<ResourceGroup> {
        self.index.clear();
        self.records = 0;
        std::mem::take(&mut self.groups)
    }
}
