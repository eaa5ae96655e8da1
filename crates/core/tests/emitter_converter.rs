//! Emitter and converter wired together without a receiver.

use std::time::Duration;

use logpipe_core::{
    testing::fixtures, AttributeValue, ConverterConfig, DeliveryBatch, EmitterConfig,
    FlushReason, LogConverter, LogEmitter, ResourceFingerprint,
};

async fn run_chain(
    emitter_config: EmitterConfig,
    converter_config: ConverterConfig,
    records: Vec<logpipe_core::Record>,
) -> Vec<DeliveryBatch> {
    let (emitter, mut batches) = LogEmitter::channel(emitter_config).unwrap();
    let converter = std::sync::Arc::new(LogConverter::new(converter_config).unwrap());
    let mut deliveries = converter.take_out_channel().await.unwrap();

    emitter.start().await;
    converter.start().await;

    let forward = {
        let converter = converter.clone();
        tokio::spawn(async move {
            while let Some(batch) = batches.recv().await {
                converter.batch(batch).await.unwrap();
            }
        })
    };
    let collect = tokio::spawn(async move {
        let mut out = Vec::new();
        while let Some(delivery) = deliveries.recv().await {
            out.push(delivery);
        }
        out
    });

    for record in records {
        emitter.accept(record).await.unwrap();
    }
    emitter.stop().await.unwrap();
    forward.await.unwrap();
    converter.stop().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), collect)
        .await
        .expect("output queue should close after stop")
        .unwrap()
}

#[tokio::test]
async fn test_groups_accumulate_across_emitter_batches() {
    let emitter = EmitterConfig::default()
        .with_max_batch_size(2)
        .with_flush_interval(Duration::ZERO);
    let converter = ConverterConfig::default()
        .with_worker_count(3)
        .with_flush_interval(Duration::from_secs(60));

    let records = vec![
        fixtures::record("a", "1"),
        fixtures::record("b", "2"),
        fixtures::record("a", "3"),
        fixtures::record("b", "4"),
        fixtures::record("a", "5"),
    ];
    let deliveries = run_chain(emitter, converter, records).await;

    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].reason(), FlushReason::Drain);

    let fp_a = ResourceFingerprint::of(fixtures::record("a", "").resource());
    let group_a = deliveries[0].group(&fp_a).unwrap();
    assert_eq!(fixtures::bodies(group_a.records()), vec!["1", "3", "5"]);
}

#[tokio::test]
async fn test_resource_key_order_does_not_split_groups() {
    let first = fixtures::record_with_resource(
        &[
            ("host", AttributeValue::from("a")),
            ("service", AttributeValue::from("api")),
        ],
        "1",
    );
    let second = fixtures::record_with_resource(
        &[
            ("service", AttributeValue::from("api")),
            ("host", AttributeValue::from("a")),
        ],
        "2",
    );
    let other = fixtures::record_with_resource(
        &[
            ("host", AttributeValue::from("a")),
            ("service", AttributeValue::from("web")),
        ],
        "3",
    );

    let deliveries = run_chain(
        EmitterConfig::default()
            .with_max_batch_size(3)
            .with_flush_interval(Duration::ZERO),
        ConverterConfig::default().with_worker_count(1),
        vec![first, second, other],
    )
    .await;

    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].group_count(), 2);
    assert_eq!(
        fixtures::bodies(deliveries[0].groups()[0].records()),
        vec!["1", "2"]
    );
}

#[tokio::test]
async fn test_every_record_lands_in_exactly_one_group() {
    let records: Vec<_> = (0..97)
        .map(|i| fixtures::record(&format!("host-{}", i % 5), &i.to_string()))
        .collect();

    let deliveries = run_chain(
        EmitterConfig::default()
            .with_max_batch_size(10)
            .with_flush_interval(Duration::ZERO),
        ConverterConfig::default().with_worker_count(4),
        records,
    )
    .await;

    let total: usize = deliveries.iter().map(DeliveryBatch::record_count).sum();
    assert_eq!(total, 97);
    for delivery in &deliveries {
        let mut fingerprints: Vec<_> = delivery.groups().iter().map(|g| g.fingerprint()).collect();
        let before = fingerprints.len();
        fingerprints.sort();
        fingerprints.dedup();
        assert_eq!(fingerprints.len(), before, "one group per resource");
    }
}
