//! Mock consumer for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::converter::DeliveryBatch;
use crate::receiver::{ConsumerError, LogConsumer};
use crate::record::Record;

/// Mock implementation of the LogConsumer trait.
///
/// Provides controllable behavior for testing:
/// - Track delivered batches for assertions
/// - Simulate failures, once or for every call
/// - Simulate a slow consumer
///
/// # Example
///
/// ```rust,ignore
/// use logpipe_core::testing::MockConsumer;
///
/// let consumer = Arc::new(MockConsumer::new());
/// consumer.set_delay(Duration::from_millis(50)).await;
///
/// // Run a receiver against it...
///
/// assert_eq!(consumer.record_count().await, 3);
/// ```
#[derive(Debug, Default)]
pub struct MockConsumer {
    /// Batches accepted by the consumer.
    delivered: Arc<RwLock<Vec<DeliveryBatch>>>,
    /// Number of calls, including failed ones.
    calls: Arc<RwLock<usize>>,
    /// If set, the next delivery will fail with this error.
    next_error: Arc<RwLock<Option<ConsumerError>>>,
    /// If true, every delivery fails.
    fail_all: Arc<RwLock<bool>>,
    /// Simulated time spent per delivery.
    delay: Arc<RwLock<Duration>>,
}

impl MockConsumer {
    /// Create a new mock consumer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all accepted delivery batches.
    pub async fn delivered_batches(&self) -> Vec<DeliveryBatch> {
        self.delivered.read().await.clone()
    }

    /// Every accepted record, in delivery order.
    pub async fn delivered_records(&self) -> Vec<Record> {
        self.delivered
            .read()
            .await
            .iter()
            .flat_map(|batch| batch.groups().iter())
            .flat_map(|group| group.records().iter().cloned())
            .collect()
    }

    /// Number of accepted records.
    pub async fn record_count(&self) -> usize {
        self.delivered
            .read()
            .await
            .iter()
            .map(DeliveryBatch::record_count)
            .sum()
    }

    /// Number of delivery calls, including failed ones.
    pub async fn call_count(&self) -> usize {
        *self.calls.read().await
    }

    /// Configure the next delivery to fail with the given error.
    pub async fn set_next_error(&self, error: ConsumerError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every delivery fail.
    pub async fn set_fail_all(&self, fail: bool) {
        *self.fail_all.write().await = fail;
    }

    /// Set the simulated delivery duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Polls until at least `count` records were accepted.
    ///
    /// Returns false if that did not happen within `timeout`.
    pub async fn wait_for_records(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.record_count().await < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl LogConsumer for MockConsumer {
    async fn consume_logs(&self, batch: DeliveryBatch) -> Result<(), ConsumerError> {
        *self.calls.write().await += 1;

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if *self.fail_all.read().await {
            return Err(ConsumerError::Unavailable("mock consumer failing".to_string()));
        }

        self.delivered.write().await.push(batch);
        Ok(())
    }
}
