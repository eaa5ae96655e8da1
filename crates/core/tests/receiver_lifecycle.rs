//! Receiver lifecycle integration tests.
//!
//! These tests run the full pipeline against mock collaborators:
//! - Start/stop state machine
//! - Size and interval batching seen from the consumer
//! - Drain on stop and record accounting
//! - Checkpoint storage ownership
//! - Error aggregation and the shutdown timeout

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use logpipe_core::{
    testing::{fixtures, MockConsumer, MockPipeline, MockStorageHost},
    Config, ConfiguredStorageHost, ConsumerError, LogReceiver, MemoryStorageClient,
    ReceiverError, ReceiverState, StorageClient, StorageConfig, StorageError, StorageHost,
    UpstreamError,
};

/// Test helper wiring a receiver to mocks.
struct TestHarness {
    receiver: LogReceiver,
    pipeline: Arc<MockPipeline>,
    consumer: Arc<MockConsumer>,
}

impl TestHarness {
    fn new(config: Config) -> Self {
        Self::with_host(config, Arc::new(MockStorageHost::new()))
    }

    fn with_host(config: Config, host: Arc<dyn StorageHost>) -> Self {
        let pipeline = Arc::new(MockPipeline::new());
        let consumer = Arc::new(MockConsumer::new());
        let receiver = LogReceiver::new(&config, pipeline.clone(), consumer.clone(), host)
            .expect("valid config");
        Self {
            receiver,
            pipeline,
            consumer,
        }
    }

    /// Size-triggered batches only.
    fn size_only(size: usize) -> Self {
        Self::new(fixtures::config(size, Duration::ZERO))
    }
}

// =============================================================================
// State machine
// =============================================================================

#[tokio::test]
async fn test_start_and_stop() {
    let harness = TestHarness::size_only(10);
    assert_eq!(harness.receiver.status().await.state, ReceiverState::Created);

    harness.receiver.start().await.unwrap();
    assert_eq!(harness.receiver.status().await.state, ReceiverState::Running);
    assert!(harness.pipeline.is_running().await);

    harness.receiver.stop().await.unwrap();
    assert_eq!(harness.receiver.status().await.state, ReceiverState::Stopped);
    assert_eq!(harness.pipeline.stop_count().await, 1);
}

#[tokio::test]
async fn test_start_twice_is_an_error() {
    let harness = TestHarness::size_only(10);
    harness.receiver.start().await.unwrap();

    let result = harness.receiver.start().await;
    assert!(matches!(
        result,
        Err(ReceiverError::InvalidState {
            actual: ReceiverState::Running,
            ..
        })
    ));
    assert_eq!(harness.pipeline.start_count().await, 1);

    harness.receiver.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_twice_is_a_noop() {
    let harness = TestHarness::size_only(10);
    harness.receiver.start().await.unwrap();

    tokio_test::assert_ok!(harness.receiver.stop().await);
    tokio_test::assert_ok!(harness.receiver.stop().await);
    assert_eq!(harness.pipeline.stop_count().await, 1);
}

#[tokio::test]
async fn test_stopped_is_terminal() {
    let harness = TestHarness::size_only(10);
    harness.receiver.start().await.unwrap();
    harness.receiver.stop().await.unwrap();

    assert!(matches!(
        harness.receiver.start().await,
        Err(ReceiverError::InvalidState {
            actual: ReceiverState::Stopped,
            ..
        })
    ));
}

#[tokio::test]
async fn test_stop_before_start() {
    let harness = TestHarness::size_only(10);
    harness.receiver.stop().await.unwrap();

    assert_eq!(harness.receiver.status().await.state, ReceiverState::Stopped);
    assert_eq!(harness.pipeline.start_count().await, 0);
    assert_eq!(harness.pipeline.stop_count().await, 0);
    assert!(harness.receiver.start().await.is_err());
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = Config::default();
    config.emitter.max_batch_size = 0;
    config.emitter.flush_interval_ms = 0;

    let result = LogReceiver::new(
        &config,
        Arc::new(MockPipeline::new()),
        Arc::new(MockConsumer::new()),
        Arc::new(MockStorageHost::new()),
    );
    assert!(result.is_err());
}

// =============================================================================
// Batching as seen by the consumer
// =============================================================================

#[tokio::test]
async fn test_full_batch_delivered_and_remainder_flushed_on_stop() {
    let harness = TestHarness::size_only(2);
    harness.receiver.start().await.unwrap();

    harness
        .pipeline
        .emit_all(vec![fixtures::record("a", "A"), fixtures::record("a", "B")])
        .await
        .unwrap();
    assert!(
        harness
            .consumer
            .wait_for_records(2, Duration::from_secs(2))
            .await
    );

    harness.pipeline.emit(fixtures::record("a", "C")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.consumer.record_count().await, 2, "C stays buffered");

    harness.receiver.stop().await.unwrap();

    let records = harness.consumer.delivered_records().await;
    assert_eq!(fixtures::bodies(&records), vec!["A", "B", "C"]);

    let batches = harness.consumer.delivered_batches().await;
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].record_count(), 2);
    assert_eq!(batches[1].record_count(), 1);
}

#[tokio::test]
async fn test_small_batch_delivered_within_interval() {
    let harness = TestHarness::new(fixtures::config(100, Duration::from_millis(50)));
    harness.receiver.start().await.unwrap();

    harness
        .pipeline
        .emit(fixtures::record("a", "lonely"))
        .await
        .unwrap();

    assert!(
        harness
            .consumer
            .wait_for_records(1, Duration::from_millis(500))
            .await,
        "interval flush should deliver without stop"
    );

    harness.receiver.stop().await.unwrap();
    assert_eq!(harness.consumer.record_count().await, 1);
}

#[tokio::test]
async fn test_exact_multiple_of_batch_size() {
    let harness = TestHarness::size_only(3);
    harness.receiver.start().await.unwrap();

    harness
        .pipeline
        .emit_all(fixtures::records("a", "r", 9))
        .await
        .unwrap();
    harness.receiver.stop().await.unwrap();

    let batches = harness.consumer.delivered_batches().await;
    assert_eq!(batches.len(), 3);
    assert!(batches.iter().all(|b| b.record_count() == 3));
}

#[tokio::test]
async fn test_one_delivery_groups_by_host() {
    let harness = TestHarness::size_only(3);
    harness.receiver.start().await.unwrap();

    harness
        .pipeline
        .emit_all(vec![
            fixtures::record("a", "1"),
            fixtures::record("a", "2"),
            fixtures::record("b", "3"),
        ])
        .await
        .unwrap();
    harness.receiver.stop().await.unwrap();

    let batches = harness.consumer.delivered_batches().await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].group_count(), 2);

    let groups = batches[0].groups();
    assert_eq!(fixtures::bodies(groups[0].records()), vec!["1", "2"]);
    assert_eq!(fixtures::bodies(groups[1].records()), vec!["3"]);
}

#[tokio::test]
async fn test_records_emitted_during_start_are_delivered() {
    let harness = TestHarness::size_only(2);
    harness
        .pipeline
        .set_initial_records(fixtures::records("a", "boot", 5))
        .await;

    harness.receiver.start().await.unwrap();
    harness.receiver.stop().await.unwrap();

    assert_eq!(harness.consumer.record_count().await, 5);
}

// =============================================================================
// Drain and accounting
// =============================================================================

#[tokio::test]
async fn test_slow_consumer_still_gets_everything_on_stop() {
    let mut config = fixtures::config(5, Duration::ZERO);
    config.emitter.queue_capacity = 1;
    config.converter.queue_capacity = 1;
    let harness = TestHarness::new(config);
    harness.consumer.set_delay(Duration::from_millis(10)).await;
    harness.receiver.start().await.unwrap();

    harness
        .pipeline
        .emit_all(fixtures::records("a", "r", 50))
        .await
        .unwrap();
    harness.receiver.stop().await.unwrap();

    let records = harness.consumer.delivered_records().await;
    let expected: Vec<String> = (0..50).map(|i| format!("r-{}", i)).collect();
    assert_eq!(fixtures::bodies(&records), expected);
}

#[tokio::test]
async fn test_delivered_plus_dropped_equals_accepted() {
    let harness = TestHarness::size_only(4);
    harness
        .consumer
        .set_next_error(ConsumerError::Rejected("disk full".to_string()))
        .await;
    harness.receiver.start().await.unwrap();

    let mut records = fixtures::records("a", "r", 10);
    records.insert(3, fixtures::malformed_record("a"));
    records.insert(7, fixtures::malformed_record("b"));
    harness.pipeline.emit_all(records).await.unwrap();

    harness.receiver.stop().await.unwrap();

    let status = harness.receiver.status().await;
    assert_eq!(status.records_accepted, 12);
    assert_eq!(status.converter.records_dropped, 2);
    assert_eq!(status.deliveries_failed, 1);
    assert_eq!(
        status.records_delivered + status.records_dropped,
        status.records_accepted
    );
    assert_eq!(
        status.records_delivered,
        harness.consumer.record_count().await as u64
    );
}

#[tokio::test]
async fn test_consumer_failure_is_not_retried() {
    let harness = TestHarness::size_only(1);
    harness.consumer.set_fail_all(true).await;
    harness.receiver.start().await.unwrap();

    harness
        .pipeline
        .emit_all(fixtures::records("a", "r", 3))
        .await
        .unwrap();
    harness.receiver.stop().await.unwrap();

    assert_eq!(harness.consumer.call_count().await, 3);
    let status = harness.receiver.status().await;
    assert_eq!(status.deliveries, 3);
    assert_eq!(status.deliveries_failed, 3);
    assert_eq!(status.records_dropped, 3);
}

#[tokio::test]
async fn test_per_host_order_with_many_workers() {
    let mut config = fixtures::config(7, Duration::from_millis(5));
    config.converter.worker_count = Some(4);
    let harness = TestHarness::new(config);
    harness.receiver.start().await.unwrap();

    for i in 0..300 {
        let host = ["a", "b", "c"][i % 3];
        harness
            .pipeline
            .emit(fixtures::record(host, &i.to_string()))
            .await
            .unwrap();
    }
    harness.receiver.stop().await.unwrap();

    let records = harness.consumer.delivered_records().await;
    assert_eq!(records.len(), 300);
    for host in ["a", "b", "c"] {
        let seen: Vec<u32> = records
            .iter()
            .filter(|r| r.resource().get("host").and_then(|v| v.as_str()) == Some(host))
            .map(|r| r.body().as_str().unwrap().parse().unwrap())
            .collect();
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        assert_eq!(seen, sorted, "records of host {} out of order", host);
    }
}

// =============================================================================
// Startup failures
// =============================================================================

#[tokio::test]
async fn test_pipeline_start_failure_stops_receiver() {
    let client = Arc::new(MemoryStorageClient::new("r"));
    let host = Arc::new(MockStorageHost::with_client(client.clone()));
    let harness = TestHarness::with_host(fixtures::config(10, Duration::ZERO), host);
    harness
        .pipeline
        .set_start_error(UpstreamError::Failed("bad glob".to_string()))
        .await;

    let result = harness.receiver.start().await;
    assert!(matches!(result, Err(ReceiverError::Upstream(_))));
    assert_eq!(harness.receiver.status().await.state, ReceiverState::Stopped);
    assert!(matches!(client.get("k").await, Err(StorageError::Closed)));

    tokio_test::assert_ok!(harness.receiver.stop().await);
}

#[tokio::test]
async fn test_storage_failure_prevents_start() {
    let host = Arc::new(MockStorageHost::new());
    host.set_next_error(StorageError::Database("locked".to_string()))
        .await;
    let harness = TestHarness::with_host(fixtures::config(10, Duration::ZERO), host);

    let result = harness.receiver.start().await;
    assert!(matches!(result, Err(ReceiverError::Storage(_))));
    assert_eq!(harness.pipeline.start_count().await, 0);
    assert_eq!(harness.receiver.status().await.state, ReceiverState::Stopped);
}

// =============================================================================
// Storage
// =============================================================================

#[tokio::test]
async fn test_host_without_storage_gets_nop_persister() {
    let host = Arc::new(MockStorageHost::new());
    let mut config = fixtures::config(10, Duration::ZERO);
    config.receiver.id = "journald".to_string();
    let harness = TestHarness::with_host(config, host.clone());
    harness.receiver.start().await.unwrap();

    assert_eq!(host.requested_ids().await, vec!["journald".to_string()]);

    let persister = harness.pipeline.persister().await.unwrap();
    persister.set("cursor", b"s=1".to_vec()).await.unwrap();
    assert_eq!(persister.get("cursor").await.unwrap(), None);

    harness.receiver.stop().await.unwrap();
}

#[tokio::test]
async fn test_checkpoints_are_scoped_and_storage_closed_last() {
    let client = Arc::new(MemoryStorageClient::new("r"));
    let host = Arc::new(MockStorageHost::with_client(client.clone()));
    let mut config = fixtures::config(10, Duration::ZERO);
    config.receiver.id = "filelog".to_string();
    let harness = TestHarness::with_host(config, host);
    harness.receiver.start().await.unwrap();

    let persister = harness.pipeline.persister().await.unwrap();
    persister
        .scoped("file_input")
        .set_json("offset", &4096u64)
        .await
        .unwrap();
    assert_eq!(
        client.get("filelog.file_input.offset").await.unwrap(),
        Some(b"4096".to_vec())
    );

    harness.receiver.stop().await.unwrap();
    assert!(matches!(
        client.get("filelog.file_input.offset").await,
        Err(StorageError::Closed)
    ));
}

#[tokio::test]
async fn test_sqlite_checkpoint_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = fixtures::config(10, Duration::ZERO);
    let host = Arc::new(ConfiguredStorageHost::new(StorageConfig::sqlite(
        dir.path().join("checkpoints.db"),
    )));

    let first = TestHarness::with_host(config.clone(), host.clone());
    first.receiver.start().await.unwrap();
    first
        .pipeline
        .persister()
        .await
        .unwrap()
        .set_json("offset", &128u64)
        .await
        .unwrap();
    first.receiver.stop().await.unwrap();

    let second = TestHarness::with_host(config, host);
    second.receiver.start().await.unwrap();
    let offset: Option<u64> = second
        .pipeline
        .persister()
        .await
        .unwrap()
        .get_json("offset")
        .await
        .unwrap();
    assert_eq!(offset, Some(128));
    second.receiver.stop().await.unwrap();
}

// =============================================================================
// Shutdown errors
// =============================================================================

#[tokio::test]
async fn test_shutdown_errors_are_aggregated() {
    let harness = TestHarness::size_only(10);
    harness
        .pipeline
        .set_stop_error(UpstreamError::Failed("tail crashed".to_string()))
        .await;
    harness.receiver.start().await.unwrap();
    harness
        .pipeline
        .emit_all(fixtures::records("a", "r", 3))
        .await
        .unwrap();

    let err = harness.receiver.stop().await.unwrap_err();
    match err {
        ReceiverError::Shutdown(errors) => {
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0], ReceiverError::Upstream(_)));
        }
        other => panic!("expected shutdown error, got {:?}", other),
    }

    // The rest of the shutdown still ran.
    assert_eq!(harness.consumer.record_count().await, 3);
    assert_eq!(harness.receiver.status().await.state, ReceiverState::Stopped);
}

#[tokio::test]
async fn test_hung_consumer_is_abandoned_after_shutdown_timeout() {
    let client = Arc::new(MemoryStorageClient::new("r"));
    let host = Arc::new(MockStorageHost::with_client(client.clone()));
    let mut config = fixtures::config(1, Duration::ZERO);
    config.receiver.shutdown_timeout_ms = 100;
    let harness = TestHarness::with_host(config, host);
    harness.consumer.set_delay(Duration::from_secs(3600)).await;
    harness.receiver.start().await.unwrap();

    harness
        .pipeline
        .emit(fixtures::record("a", "stuck"))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), async {
        while harness.consumer.call_count().await == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("delivery should reach the consumer");

    let result = tokio::time::timeout(Duration::from_secs(2), harness.receiver.stop())
        .await
        .expect("stop should give up on a consumer that never returns");
    match result {
        Err(ReceiverError::Shutdown(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0], ReceiverError::ShutdownTimeout(_)));
        }
        other => panic!("expected shutdown timeout, got {:?}", other),
    }

    let status = harness.receiver.status().await;
    assert_eq!(status.state, ReceiverState::Stopped);
    assert_eq!(status.records_accepted, 1);
    assert_eq!(status.records_delivered, 0);
    assert_eq!(status.records_dropped, 1);
    assert_eq!(status.deliveries_failed, 1);
    assert!(matches!(client.get("any").await, Err(StorageError::Closed)));
}

#[tokio::test]
async fn test_queued_deliveries_are_dropped_after_shutdown_timeout() {
    let mut config = fixtures::config(1, Duration::ZERO);
    config.receiver.shutdown_timeout_ms = 50;
    let harness = TestHarness::new(config);
    harness.consumer.set_delay(Duration::from_secs(3600)).await;
    harness.receiver.start().await.unwrap();

    harness
        .pipeline
        .emit_all(fixtures::records("a", "r", 5))
        .await
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), harness.receiver.stop())
        .await
        .expect("stop should finish after the shutdown timeout");
    assert!(result.is_err());

    let status = harness.receiver.status().await;
    assert_eq!(status.records_accepted, 5);
    assert_eq!(status.records_delivered, 0);
    assert_eq!(
        status.records_delivered + status.records_dropped,
        status.records_accepted
    );
    assert_eq!(harness.consumer.record_count().await, 0);
}
