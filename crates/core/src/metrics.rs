//! Prometheus metrics for the log pipeline.
//!
//! This module provides metrics for:
//! - Emitter (records accepted, batches flushed by trigger)
//! - Converter (records converted, delivery batches, group fan-out)
//! - Receiver (deliveries to the consumer, records delivered)
//! - Drops at every stage, and records refused before acceptance

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Emitter Metrics
// =============================================================================

/// Records accepted from the upstream pipeline.
pub static RECORDS_ACCEPTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "logpipe_records_accepted_total",
        "Total records accepted by the emitter",
    )
    .unwrap()
});

/// Records refused because the emitter was already stopped. These were never
/// accepted, so they are not drops.
pub static RECORDS_REFUSED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "logpipe_records_refused_total",
        "Total records refused by a stopped emitter",
    )
    .unwrap()
});

/// Emitter batches flushed by trigger.
pub static EMITTER_BATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "logpipe_emitter_batches_total",
            "Total batches flushed by the emitter",
        ),
        &["trigger"], // "size", "interval", "stop"
    )
    .unwrap()
});

/// Records per emitter batch.
pub static EMITTER_BATCH_SIZE: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "logpipe_emitter_batch_records",
            "Number of records per emitter batch",
        )
        .buckets(vec![1.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]),
        &["trigger"],
    )
    .unwrap()
});

// =============================================================================
// Converter Metrics
// =============================================================================

/// Records converted and placed into a resource group.
pub static RECORDS_CONVERTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "logpipe_records_converted_total",
        "Total records grouped by the converter",
    )
    .unwrap()
});

/// Delivery batches produced by the converter.
pub static DELIVERY_BATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "logpipe_delivery_batches_total",
            "Total delivery batches produced by the converter",
        ),
        &["reason"], // "batch", "interval", "group_cap", "drain"
    )
    .unwrap()
});

/// Resource groups per delivery batch.
pub static GROUPS_PER_DELIVERY: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "logpipe_groups_per_delivery",
            "Number of resource groups per delivery batch",
        )
        .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 500.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Receiver Metrics
// =============================================================================

/// Deliveries to the consumer by result.
pub static DELIVERIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "logpipe_deliveries_total",
            "Total delivery calls to the consumer",
        ),
        &["result"], // "success", "failed", "cancelled"
    )
    .unwrap()
});

/// Records handed to the consumer by result.
pub static RECORDS_DELIVERED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "logpipe_records_delivered_total",
            "Total records handed to the consumer",
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Consumer delivery duration in seconds.
pub static DELIVERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "logpipe_delivery_duration_seconds",
            "Duration of consumer delivery calls",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Drops
// =============================================================================

/// Accepted records that never reached the consumer, by stage.
pub static RECORDS_DROPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("logpipe_records_dropped_total", "Total records dropped"),
        &["stage"], // "emitter", "converter", "pump"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all pipeline metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Emitter
        Box::new(RECORDS_ACCEPTED.clone()),
        Box::new(RECORDS_REFUSED.clone()),
        Box::new(EMITTER_BATCHES.clone()),
        Box::new(EMITTER_BATCH_SIZE.clone()),
        // Converter
        Box::new(RECORDS_CONVERTED.clone()),
        Box::new(DELIVERY_BATCHES.clone()),
        Box::new(GROUPS_PER_DELIVERY.clone()),
        // Receiver
        Box::new(DELIVERIES.clone()),
        Box::new(RECORDS_DELIVERED.clone()),
        Box::new(DELIVERY_DURATION.clone()),
        // Drops
        Box::new(RECORDS_DROPPED.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        RECORDS_DROPPED.with_label_values(&["converter"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"logpipe_records_dropped_total".to_string()));
    }
}
